use std::time::Duration;

use async_trait::async_trait;
use partsline_core::{Payload, ToolError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Status and raw text of an HTTP response, before any interpretation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<TransportError> for ToolError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => ToolError::Timeout,
            TransportError::Connect(message) => ToolError::Connection { message },
            TransportError::Request(message) => ToolError::RequestFailure { message },
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportBuildError {
    #[error("api key contains characters that are not valid in an HTTP header")]
    InvalidApiKey,
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// One HTTP POST with a JSON body. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        payload: &Payload,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(api_key: &SecretString) -> Result<Self, TransportBuildError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|_| TransportBuildError::InvalidApiKey)?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(TransportBuildError::Client)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        payload: &Payload,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(RawResponse { status, body })
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if err.is_connect() {
        return TransportError::Connect(err.to_string());
    }
    TransportError::Request(err.to_string())
}

#[cfg(test)]
mod tests {
    use partsline_core::ToolError;

    use super::{ReqwestTransport, TransportBuildError, TransportError};

    #[test]
    fn transport_errors_map_onto_tool_taxonomy() {
        assert_eq!(ToolError::from(TransportError::Timeout), ToolError::Timeout);
        assert!(matches!(
            ToolError::from(TransportError::Connect("refused".to_string())),
            ToolError::Connection { .. }
        ));
        assert!(matches!(
            ToolError::from(TransportError::Request("builder".to_string())),
            ToolError::RequestFailure { .. }
        ));
    }

    #[test]
    fn newline_in_api_key_is_rejected() {
        let result = ReqwestTransport::new(&"bad\nkey".to_string().into());
        assert!(matches!(result, Err(TransportBuildError::InvalidApiKey)));
    }
}
