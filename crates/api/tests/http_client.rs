use partsline_api::{ApiClient, ReqwestTransport};
use partsline_core::{Payload, RetryPolicy, ToolError, ToolName, ToolRequest};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, max_retries: u32) -> ApiClient<ReqwestTransport> {
    let transport = match ReqwestTransport::new(&"test-key".to_string().into()) {
        Ok(transport) => transport,
        Err(error) => panic!("transport should build: {error}"),
    };
    ApiClient::new(
        server.uri(),
        transport,
        RetryPolicy { max_retries, timeout_secs: 5, backoff_ms: 0 },
    )
}

fn cancel_request() -> ToolRequest {
    let mut payload = Payload::new();
    payload.insert("membershipId".to_string(), Value::String("2237407160".to_string()));
    ToolRequest {
        tool: ToolName::SubscriptionCancel,
        endpoint_path: "/subscription/cancel",
        payload,
    }
}

#[tokio::test]
async fn posts_json_with_standard_headers_and_returns_document() {
    let server = MockServer::start().await;
    let document = json!({
        "statusCode": 200,
        "body": {"message": "Subscription canceled successfully."}
    });
    Mock::given(method("POST"))
        .and(path("/subscription/cancel"))
        .and(header("x-api-key", "test-key"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"membershipId": "2237407160"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(document.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server, 3).send(&cancel_request()).await;

    let response = match result {
        Ok(response) => response,
        Err(error) => panic!("expected success, got {error}"),
    };
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, document);
}

#[tokio::test]
async fn not_found_is_structural_success() {
    let server = MockServer::start().await;
    let document = json!({"statusCode": 404, "body": {"message": "No subscription found"}});
    Mock::given(method("POST"))
        .and(path("/subscription/cancel"))
        .respond_with(ResponseTemplate::new(404).set_body_json(document.clone()))
        .mount(&server)
        .await;

    let result = client_for(&server, 3).send(&cancel_request()).await;

    assert_eq!(result.map(|response| response.body), Ok(document));
}

#[tokio::test]
async fn server_error_is_returned_once_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/subscription/cancel"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server, 3).send(&cancel_request()).await;

    assert_eq!(
        result,
        Err(ToolError::UnexpectedStatus { status: 500, body: "Internal Server Error".to_string() })
    );
}

#[tokio::test]
async fn unreachable_backend_is_a_connection_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let transport = match ReqwestTransport::new(&"test-key".to_string().into()) {
        Ok(transport) => transport,
        Err(error) => panic!("transport should build: {error}"),
    };
    let policy = RetryPolicy { max_retries: 2, timeout_secs: 2, backoff_ms: 0 };
    let client = ApiClient::new(uri, transport, policy);

    let result = client.send(&cancel_request()).await;

    assert!(matches!(result, Err(ToolError::Connection { .. }) | Err(ToolError::Timeout)));
}
