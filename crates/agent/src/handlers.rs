use std::sync::Arc;

use async_trait::async_trait;
use partsline_api::Dispatch;
use partsline_core::{HandlerTag, Parameters, ToolError, ToolName, ToolResult};
use tracing::{info, warn};

use crate::tools::build_request;

/// A specialist that owns a fixed set of tools.
#[async_trait]
pub trait Handler: Send + Sync {
    fn tag(&self) -> HandlerTag;

    fn tools(&self) -> &'static [ToolName];

    fn owns(&self, tool: ToolName) -> bool {
        self.tools().contains(&tool)
    }

    async fn handle(&self, tool: ToolName, parameters: &Parameters) -> ToolResult;
}

const SUPPORT_TOOLS: &[ToolName] = &[
    ToolName::OrderStatus,
    ToolName::RefundStatus,
    ToolName::SubscriptionLookup,
    ToolName::SubscriptionCancel,
    ToolName::SubscriptionUpdate,
];

const SALES_TOOLS: &[ToolName] = &[ToolName::PartLookup];

/// Orders, refunds and subscriptions.
pub struct SupportHandler {
    dispatch: Arc<dyn Dispatch>,
}

impl SupportHandler {
    pub fn new(dispatch: Arc<dyn Dispatch>) -> Self {
        Self { dispatch }
    }
}

#[async_trait]
impl Handler for SupportHandler {
    fn tag(&self) -> HandlerTag {
        HandlerTag::Support
    }

    fn tools(&self) -> &'static [ToolName] {
        SUPPORT_TOOLS
    }

    async fn handle(&self, tool: ToolName, parameters: &Parameters) -> ToolResult {
        invoke(self, self.dispatch.as_ref(), tool, parameters).await
    }
}

/// Part details, compatibility and shipping.
pub struct SalesHandler {
    dispatch: Arc<dyn Dispatch>,
}

impl SalesHandler {
    pub fn new(dispatch: Arc<dyn Dispatch>) -> Self {
        Self { dispatch }
    }
}

#[async_trait]
impl Handler for SalesHandler {
    fn tag(&self) -> HandlerTag {
        HandlerTag::Sales
    }

    fn tools(&self) -> &'static [ToolName] {
        SALES_TOOLS
    }

    async fn handle(&self, tool: ToolName, parameters: &Parameters) -> ToolResult {
        invoke(self, self.dispatch.as_ref(), tool, parameters).await
    }
}

async fn invoke<H>(
    handler: &H,
    dispatch: &dyn Dispatch,
    tool: ToolName,
    parameters: &Parameters,
) -> ToolResult
where
    H: Handler + ?Sized,
{
    if !handler.owns(tool) {
        return Err(ToolError::validation(format!(
            "{} is not handled by {}",
            tool.as_str(),
            handler.tag().as_str()
        )));
    }

    let request = build_request(tool, parameters).map_err(|error| {
        warn!(
            event_name = "handler.validation_failed",
            handler = handler.tag().as_str(),
            tool = tool.as_str(),
            error = %error,
            "tool parameters rejected before dispatch"
        );
        error
    })?;

    info!(
        event_name = "handler.dispatch",
        handler = handler.tag().as_str(),
        tool = tool.as_str(),
        endpoint = request.endpoint_path,
        "dispatching tool request"
    );
    dispatch.dispatch(&request).await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use partsline_api::Dispatch;
    use partsline_core::{Parameters, ToolError, ToolName, ToolRequest, ToolResponse, ToolResult};
    use serde_json::{json, Value};

    use super::{Handler, SalesHandler, SupportHandler};

    #[derive(Default)]
    struct RecordingDispatch {
        requests: Mutex<Vec<ToolRequest>>,
    }

    impl RecordingDispatch {
        fn requests(&self) -> Vec<ToolRequest> {
            self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Dispatch for RecordingDispatch {
        async fn dispatch(&self, request: &ToolRequest) -> ToolResult {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            Ok(ToolResponse {
                status_code: 200,
                body: json!({"statusCode": 200, "body": {"message": "ok"}}),
            })
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[tokio::test]
    async fn support_dispatches_validated_payload() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let handler = SupportHandler::new(dispatch.clone());

        let result = handler
            .handle(ToolName::OrderStatus, &params(&[("orderNo", "W174191"), ("zip", "20020")]))
            .await;

        assert!(result.is_ok());
        let requests = dispatch.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].endpoint_path, "/parts/status");
        assert_eq!(
            Value::Object(requests[0].payload.clone()),
            json!({"orderNo": "W174191", "zip": "20020"})
        );
    }

    #[tokio::test]
    async fn invalid_update_never_reaches_the_network() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let handler = SupportHandler::new(dispatch.clone());

        let result = handler
            .handle(
                ToolName::SubscriptionUpdate,
                &params(&[("membershipId", "8282916880"), ("update", "color"), ("value", "red")]),
            )
            .await;

        assert_eq!(result.err().and_then(|error| error.status_code()), Some(400));
        assert!(dispatch.requests().is_empty());
    }

    #[tokio::test]
    async fn capitalised_update_kind_never_reaches_the_network() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let handler = SupportHandler::new(dispatch.clone());

        let result = handler
            .handle(
                ToolName::SubscriptionUpdate,
                &params(&[("membershipId", "8282916880"), ("update", "Frequency"), ("value", "6")]),
            )
            .await;

        assert_eq!(result.err().and_then(|error| error.status_code()), Some(400));
        assert!(dispatch.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_required_parameter_never_reaches_the_network() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let handler = SalesHandler::new(dispatch.clone());

        let result =
            handler.handle(ToolName::PartLookup, &params(&[("modelNumber", "3352573")])).await;

        assert!(matches!(result, Err(ToolError::Validation { .. })));
        assert!(dispatch.requests().is_empty());
    }

    #[tokio::test]
    async fn handlers_refuse_tools_they_do_not_own() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let sales = SalesHandler::new(dispatch.clone());
        let support = SupportHandler::new(dispatch.clone());

        let sales_result =
            sales.handle(ToolName::OrderStatus, &params(&[("orderNo", "W174191")])).await;
        let support_result =
            support.handle(ToolName::PartLookup, &params(&[("partNumber", "1366")])).await;

        assert!(matches!(sales_result, Err(ToolError::Validation { .. })));
        assert!(matches!(support_result, Err(ToolError::Validation { .. })));
        assert!(dispatch.requests().is_empty());
        assert!(support.owns(ToolName::SubscriptionCancel));
        assert!(!support.owns(ToolName::PartLookup));
    }
}
