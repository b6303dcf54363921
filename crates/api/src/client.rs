//! Resilient client for the parts backend.
//!
//! Every call resolves to a [`ToolResult`]: structural successes (200, 201, 404)
//! carry the backend document untouched, everything else becomes a [`ToolError`]
//! value. Only timeouts and connection failures are retried.

use async_trait::async_trait;
use partsline_core::config::ApiConfig;
use partsline_core::{RetryPolicy, ToolError, ToolRequest, ToolResponse, ToolResult};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::transport::{RawResponse, ReqwestTransport, Transport, TransportBuildError};

/// Anything that can execute a validated [`ToolRequest`].
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, request: &ToolRequest) -> ToolResult;
}

pub struct ApiClient<T = ReqwestTransport> {
    base_url: String,
    transport: T,
    policy: RetryPolicy,
}

impl ApiClient<ReqwestTransport> {
    pub fn from_config(
        config: &ApiConfig,
        policy: RetryPolicy,
    ) -> Result<Self, TransportBuildError> {
        let transport = ReqwestTransport::new(&config.api_key)?;
        Ok(Self::new(config.base_url.clone(), transport, policy))
    }
}

impl<T> ApiClient<T>
where
    T: Transport,
{
    pub fn new(base_url: impl Into<String>, transport: T, policy: RetryPolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn send(&self, request: &ToolRequest) -> ToolResult {
        self.send_with_policy(request, &self.policy).await
    }

    pub async fn send_with_policy(
        &self,
        request: &ToolRequest,
        policy: &RetryPolicy,
    ) -> ToolResult {
        let url = self.endpoint(request.endpoint_path);
        let attempts = policy.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let delay = policy.backoff_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            debug!(
                event_name = "api.request.attempt",
                tool = request.tool.as_str(),
                endpoint = request.endpoint_path,
                attempt,
                attempts,
                "sending api request"
            );

            let sent = self.transport.post_json(&url, &request.payload, policy.timeout()).await;
            let result = match sent {
                Ok(raw) => classify_response(raw),
                Err(error) => Err(ToolError::from(error)),
            };

            match result {
                Err(error) if error.is_retryable() && attempt < attempts => {
                    warn!(
                        event_name = "api.request.retrying",
                        tool = request.tool.as_str(),
                        attempt,
                        attempts,
                        error_kind = error.kind(),
                        "retryable api failure"
                    );
                }
                Ok(response) => {
                    info!(
                        event_name = "api.request.completed",
                        tool = request.tool.as_str(),
                        status = response.status_code,
                        attempt,
                        "api request completed"
                    );
                    return Ok(response);
                }
                Err(error) => {
                    warn!(
                        event_name = "api.request.failed",
                        tool = request.tool.as_str(),
                        attempt,
                        error_kind = error.kind(),
                        status = error.status_code(),
                        "api request failed"
                    );
                    return Err(error);
                }
            }
        }
    }
}

#[async_trait]
impl<T> Dispatch for ApiClient<T>
where
    T: Transport,
{
    async fn dispatch(&self, request: &ToolRequest) -> ToolResult {
        self.send(request).await
    }
}

/// 200, 201 and 404 carry documented bodies; any other status is unexpected.
pub fn classify_response(raw: RawResponse) -> ToolResult {
    match raw.status {
        200 | 201 | 404 => serde_json::from_str::<Value>(&raw.body)
            .map(|body| ToolResponse { status_code: raw.status, body })
            .map_err(|error| ToolError::MalformedBody {
                status: raw.status,
                message: error.to_string(),
            }),
        status => Err(ToolError::UnexpectedStatus { status, body: raw.body }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use partsline_core::{Payload, RetryPolicy, ToolError, ToolName, ToolRequest};
    use serde_json::{json, Value};

    use super::{classify_response, ApiClient};
    use crate::transport::{RawResponse, Transport, TransportError};

    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<RawResponse, TransportError>>) -> Self {
            Self { script: Mutex::new(script.into()), ..Self::default() }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_json(
            &self,
            url: &str,
            _payload: &Payload,
            _timeout: Duration,
        ) -> Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut urls) = self.urls.lock() {
                urls.push(url.to_string());
            }
            let next = self.script.lock().ok().and_then(|mut script| script.pop_front());
            next.unwrap_or(Err(TransportError::Connect("script exhausted".to_string())))
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy { max_retries, timeout_secs: 1, backoff_ms: 0 }
    }

    fn order_request() -> ToolRequest {
        let mut payload = Payload::new();
        payload.insert("orderNo".to_string(), Value::String("W174191".to_string()));
        ToolRequest { tool: ToolName::OrderStatus, endpoint_path: "/parts/status", payload }
    }

    fn ok_body() -> String {
        json!({"statusCode": 200, "body": {"message": "Order found"}}).to_string()
    }

    #[tokio::test]
    async fn retries_connection_errors_until_success() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".to_string())),
            Err(TransportError::Connect("refused".to_string())),
            Ok(RawResponse::new(200, ok_body())),
        ]);
        let client = ApiClient::new("https://parts.test/dev/", transport, policy(3));

        let result = client.send(&order_request()).await;

        assert_eq!(result.map(|response| response.status_code), Ok(200));
        assert_eq!(client.transport().calls(), 3);
    }

    #[tokio::test]
    async fn single_attempt_budget_surfaces_error_after_one_call() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".to_string())),
            Ok(RawResponse::new(200, ok_body())),
        ]);
        let client = ApiClient::new("https://parts.test/dev", transport, policy(1));

        let result = client.send(&order_request()).await;

        assert!(matches!(result, Err(ToolError::Connection { .. })));
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn persistent_timeouts_exhaust_the_budget() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
        ]);
        let client = ApiClient::new("https://parts.test/dev", transport, policy(3));

        let result = client.send(&order_request()).await;

        assert_eq!(result, Err(ToolError::Timeout));
        assert_eq!(client.transport().calls(), 3);
    }

    #[tokio::test]
    async fn unexpected_status_and_request_failures_are_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(503, "upstream down"))]);
        let client = ApiClient::new("https://parts.test/dev", transport, policy(3));
        let result = client.send(&order_request()).await;
        assert_eq!(
            result,
            Err(ToolError::UnexpectedStatus { status: 503, body: "upstream down".to_string() })
        );
        assert_eq!(client.transport().calls(), 1);

        let transport =
            ScriptedTransport::new(vec![Err(TransportError::Request("invalid url".to_string()))]);
        let client = ApiClient::new("https://parts.test/dev", transport, policy(3));
        let result = client.send(&order_request()).await;
        assert!(matches!(result, Err(ToolError::RequestFailure { .. })));
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn url_joins_base_and_endpoint_path() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(200, ok_body()))]);
        let client = ApiClient::new("https://parts.test/dev/", transport, policy(1));

        let _ = client.send(&order_request()).await;

        let urls = client.transport().urls.lock().map(|urls| urls.clone()).unwrap_or_default();
        assert_eq!(urls, vec!["https://parts.test/dev/parts/status".to_string()]);
    }

    #[test]
    fn structural_success_codes_return_body_unmodified() {
        for status in [200u16, 201, 404] {
            let document = json!({"statusCode": status, "body": {"message": "documented shape"}});
            let result = classify_response(RawResponse::new(status, document.to_string()));
            let response = match result {
                Ok(response) => response,
                Err(error) => panic!("status {status} should be structural success: {error}"),
            };
            assert_eq!(response.status_code, status);
            assert_eq!(response.body, document);
        }
    }

    #[test]
    fn other_codes_become_unexpected_status() {
        for status in [204u16, 400, 401, 500, 502] {
            let result = classify_response(RawResponse::new(status, "raw text"));
            assert_eq!(
                result,
                Err(ToolError::UnexpectedStatus { status, body: "raw text".to_string() })
            );
        }
    }

    #[test]
    fn non_json_success_body_is_malformed() {
        let result = classify_response(RawResponse::new(200, "<html>"));
        assert!(matches!(result, Err(ToolError::MalformedBody { status: 200, .. })));
    }
}
