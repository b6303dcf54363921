use thiserror::Error;

pub const APOLOGY_MESSAGE: &str = "Sorry, I couldn't work out how to help with that. \
Please try rephrasing, and include an order number, part number, phone number, or membership ID.";

/// Failure of a single tool invocation. Returned as a value, never raised past the handler.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid parameters: {message}")]
    Validation { message: String },
    #[error("request timed out")]
    Timeout,
    #[error("connection error: {message}")]
    Connection { message: String },
    #[error("request failed: {message}")]
    RequestFailure { message: String },
    #[error("unexpected status code: {status}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("malformed response body (status {status}): {message}")]
    MalformedBody { status: u16, message: String },
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Only transport-level failures where a repeat may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connection { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } => Some(400),
            Self::UnexpectedStatus { status, .. } | Self::MalformedBody { status, .. } => {
                Some(*status)
            }
            Self::Timeout | Self::Connection { .. } | Self::RequestFailure { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Timeout => "timeout",
            Self::Connection { .. } => "connection_error",
            Self::RequestFailure { .. } => "request_failure",
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::MalformedBody { .. } => "malformed_body",
        }
    }

    /// The `error` field of the wire envelope.
    pub fn label(&self) -> String {
        match self {
            Self::Validation { message } => message.clone(),
            Self::Timeout => "Request timeout".to_string(),
            Self::Connection { .. } => "Connection error".to_string(),
            Self::RequestFailure { .. } => "Request failed".to_string(),
            Self::UnexpectedStatus { status, .. } => format!("Unexpected status code: {status}"),
            Self::MalformedBody { .. } => "Unexpected error".to_string(),
        }
    }

    /// The `details` field of the wire envelope.
    pub fn details(&self) -> String {
        match self {
            Self::Validation { .. } => "No request was sent to the API".to_string(),
            Self::Timeout => "The API request timed out".to_string(),
            Self::Connection { .. } => "Failed to connect to the API".to_string(),
            Self::RequestFailure { message } | Self::MalformedBody { message, .. } => {
                message.clone()
            }
            Self::UnexpectedStatus { body, .. } => body.clone(),
        }
    }
}

/// Failure to turn a query into exactly one handler invocation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("classification failed: {0}")]
    Classification(String),
    #[error("invalid routing decision: {0}")]
    Routing(String),
}

impl RouterError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Classification(_) => "classification_failure",
            Self::Routing(_) => "routing_error",
        }
    }

    /// Safe to show to the customer; never includes the internal detail.
    pub fn user_message(&self) -> &'static str {
        APOLOGY_MESSAGE
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{RouterError, ToolError, APOLOGY_MESSAGE};

    #[test]
    fn only_timeout_and_connection_are_retryable() {
        assert!(ToolError::Timeout.is_retryable());
        assert!(ToolError::Connection { message: "refused".to_owned() }.is_retryable());
        assert!(!ToolError::RequestFailure { message: "bad url".to_owned() }.is_retryable());
        assert!(!ToolError::UnexpectedStatus { status: 503, body: String::new() }.is_retryable());
        assert!(!ToolError::validation("orderNo is required").is_retryable());
    }

    #[test]
    fn unexpected_status_keeps_code_and_raw_body() {
        let error = ToolError::UnexpectedStatus {
            status: 502,
            body: "<html>bad gateway</html>".to_owned(),
        };

        assert_eq!(error.status_code(), Some(502));
        assert_eq!(error.label(), "Unexpected status code: 502");
        assert_eq!(error.details(), "<html>bad gateway</html>");
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(ToolError::validation("membershipId is required").status_code(), Some(400));
    }

    #[test]
    fn router_errors_hide_internal_detail() {
        let error = RouterError::Routing("classifier named handlers [support, sales]".to_owned());

        assert_eq!(error.user_message(), APOLOGY_MESSAGE);
        assert!(!error.user_message().contains("sales"));
        assert_eq!(error.kind(), "routing_error");
    }
}
