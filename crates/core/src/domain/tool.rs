use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::route::HandlerTag;
use crate::errors::{RouterError, ToolError};

/// The six backend operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    OrderStatus,
    RefundStatus,
    PartLookup,
    SubscriptionLookup,
    SubscriptionCancel,
    SubscriptionUpdate,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::OrderStatus,
        ToolName::RefundStatus,
        ToolName::PartLookup,
        ToolName::SubscriptionLookup,
        ToolName::SubscriptionCancel,
        ToolName::SubscriptionUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderStatus => "order_status",
            Self::RefundStatus => "refund_status",
            Self::PartLookup => "part_lookup",
            Self::SubscriptionLookup => "subscription_lookup",
            Self::SubscriptionCancel => "subscription_cancel",
            Self::SubscriptionUpdate => "subscription_update",
        }
    }

    /// The handler that owns this tool.
    pub fn handler(&self) -> HandlerTag {
        match self {
            Self::PartLookup => HandlerTag::Sales,
            Self::OrderStatus
            | Self::RefundStatus
            | Self::SubscriptionLookup
            | Self::SubscriptionCancel
            | Self::SubscriptionUpdate => HandlerTag::Support,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = RouterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "order_status" | "parts_get_order_status_tool" => Ok(Self::OrderStatus),
            "refund_status" | "parts_get_refund_status_tool" => Ok(Self::RefundStatus),
            "part_lookup" | "get_part_details_tool" => Ok(Self::PartLookup),
            "subscription_lookup" | "parts_subscription_lookup_tool" => {
                Ok(Self::SubscriptionLookup)
            }
            "subscription_cancel" | "parts_subscription_cancel_tool" => {
                Ok(Self::SubscriptionCancel)
            }
            "subscription_update" | "parts_subscription_update_tool" => {
                Ok(Self::SubscriptionUpdate)
            }
            other => Err(RouterError::Routing(format!("unrecognized tool `{other}`"))),
        }
    }
}

/// Maps a canonical parameter name to the key the backend expects on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub wire_key: &'static str,
}

impl ParamSpec {
    pub const fn new(name: &'static str, wire_key: &'static str) -> Self {
        Self { name, wire_key }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolContract {
    pub name: ToolName,
    pub endpoint_path: &'static str,
    /// Every one of these must be present and non-empty.
    pub required: &'static [ParamSpec],
    /// At least one of these must be present and non-empty (empty slice: no constraint).
    pub any_of: &'static [ParamSpec],
    pub optional: &'static [ParamSpec],
}

impl ToolContract {
    pub fn handler(&self) -> HandlerTag {
        self.name.handler()
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.required.iter().chain(self.any_of).chain(self.optional).map(|spec| spec.name)
    }
}

pub type Payload = Map<String, Value>;

/// A validated request, ready for the API client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolRequest {
    pub tool: ToolName,
    pub endpoint_path: &'static str,
    pub payload: Payload,
}

impl ToolRequest {
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// Structural success: the backend answered with 200, 201 or 404 and a JSON document.
///
/// `body` is the parsed document exactly as the backend sent it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: Value,
}

impl ToolResponse {
    /// The inner business payload: `body.body` when the backend wrapped it, else `body`.
    pub fn payload(&self) -> &Value {
        match self.body.get("body") {
            Some(inner) if inner.is_object() => inner,
            _ => &self.body,
        }
    }

    pub fn message(&self) -> Option<&Value> {
        self.payload().get("message")
    }
}

pub type ToolResult = Result<ToolResponse, ToolError>;

/// Uniform wire shape of a tool outcome: the backend document on success,
/// `{error, details}` otherwise.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolEnvelope {
    Success(Value),
    Failure {
        error: String,
        details: String,
        #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

impl From<&ToolResult> for ToolEnvelope {
    fn from(result: &ToolResult) -> Self {
        match result {
            Ok(response) => Self::Success(response.body.clone()),
            Err(error) => Self::Failure {
                error: error.label(),
                details: error.details(),
                status_code: error.status_code(),
            },
        }
    }
}

/// Subscription edit, resolved from the stringly `update` parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    Frequency(String),
    Quantity(String),
}

impl UpdateKind {
    /// `update` must be exactly `frequency` or `quantity`.
    pub fn parse(update: &str, value: impl Into<String>) -> Result<Self, ToolError> {
        let value = value.into();
        match update {
            "frequency" => Ok(Self::Frequency(value)),
            "quantity" => Ok(Self::Quantity(value)),
            _ => Err(ToolError::Validation {
                message: "Invalid update type. Must be 'frequency' or 'quantity'.".to_string(),
            }),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Self::Frequency(_) => "frequency",
            Self::Quantity(_) => "quantity",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Frequency(value) | Self::Quantity(value) => value,
        }
    }

    /// Writes `update` and the matching `frequency`/`quantity` entry.
    pub fn write_into(&self, payload: &mut Payload) {
        payload.insert("update".to_string(), Value::String(self.field().to_string()));
        payload.insert(self.field().to_string(), Value::String(self.value().to_string()));
    }
}

/// Immutable timeout/retry settings shared by every API client call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempt budget for retryable transport failures.
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, timeout_secs: 30, backoff_ms: 250 }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before `attempt` (1-based); the first attempt never waits.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.backoff_ms == 0 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(10);
        Duration::from_millis(self.backoff_ms.saturating_mul(1 << exponent))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{Payload, RetryPolicy, ToolEnvelope, ToolName, ToolResponse, ToolResult, UpdateKind};
    use crate::domain::route::HandlerTag;
    use crate::errors::ToolError;

    #[test]
    fn tool_names_accept_original_function_names() {
        assert_eq!("get_part_details_tool".parse::<ToolName>(), Ok(ToolName::PartLookup));
        assert_eq!("subscription-update".parse::<ToolName>(), Ok(ToolName::SubscriptionUpdate));
        assert!("teleport".parse::<ToolName>().is_err());
    }

    #[test]
    fn only_part_lookup_belongs_to_sales() {
        let sales = ToolName::ALL
            .iter()
            .filter(|tool| tool.handler() == HandlerTag::Sales)
            .collect::<Vec<_>>();
        assert_eq!(sales, vec![&ToolName::PartLookup]);
    }

    #[test]
    fn update_kind_writes_matching_key() {
        let mut payload = Payload::new();
        UpdateKind::parse("quantity", "2").map(|kind| kind.write_into(&mut payload)).ok();
        assert_eq!(
            serde_json::Value::Object(payload),
            json!({"update": "quantity", "quantity": "2"})
        );
    }

    #[test]
    fn update_kind_rejects_other_fields_with_400() {
        for update in ["color", "Frequency", "QUANTITY", " frequency ", ""] {
            let error = UpdateKind::parse(update, "blue").err();
            let status = error.as_ref().and_then(ToolError::status_code);
            assert_eq!(status, Some(400), "update={update:?}");
        }
    }

    #[test]
    fn envelope_passes_backend_document_through() {
        let document = json!({"statusCode": 404, "body": {"message": "Order not found"}});
        let ok: ToolResult = Ok(ToolResponse { status_code: 404, body: document.clone() });
        let value = serde_json::to_value(ToolEnvelope::from(&ok)).unwrap_or_default();
        assert_eq!(value, document);

        let err: ToolResult = Err(ToolError::Timeout);
        let value = serde_json::to_value(ToolEnvelope::from(&err)).unwrap_or_default();
        assert_eq!(
            value,
            json!({"error": "Request timeout", "details": "The API request timed out"})
        );
    }

    #[test]
    fn payload_unwraps_nested_body() {
        let response = ToolResponse {
            status_code: 200,
            body: json!({
                "statusCode": 200,
                "body": {"message": "Subscription canceled successfully."}
            }),
        };
        assert_eq!(
            response.message().and_then(|message| message.as_str()),
            Some("Subscription canceled successfully.")
        );

        let flat = ToolResponse { status_code: 200, body: json!({"message": "flat"}) };
        assert_eq!(flat.message().and_then(|message| message.as_str()), Some("flat"));
    }

    #[test]
    fn backoff_doubles_after_second_attempt() {
        let policy = RetryPolicy { max_retries: 4, timeout_secs: 5, backoff_ms: 100 };
        assert_eq!(policy.backoff_before(1), Duration::ZERO);
        assert_eq!(policy.backoff_before(2), Duration::from_millis(100));
        assert_eq!(policy.backoff_before(3), Duration::from_millis(200));
        assert_eq!(RetryPolicy { max_retries: 0, ..policy }.attempts(), 1);
    }
}
