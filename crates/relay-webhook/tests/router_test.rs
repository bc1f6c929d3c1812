//! HTTP-level tests: the axum routes wired to the real HTTP clients, with
//! both downstream APIs served by wiremock.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use relay_adapters::{OpenAiClient, SlackClient};
use relay_webhook::{
    create_webhook_router, CompletionRequester, ReplyPublisher, RequestHandler, RetrySuppressor,
    SlackSignatureVerifier, SlackSigner, WebhookResponse, MAX_BODY_BYTES, RETRY_NUM_HEADER,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "s3cr3t";

struct Upstreams {
    openai: MockServer,
    slack: MockServer,
}

impl Upstreams {
    async fn start() -> Self {
        Self {
            openai: MockServer::start().await,
            slack: MockServer::start().await,
        }
    }

    fn router(&self) -> Router {
        let completions = OpenAiClient::new(self.openai.uri(), SecretString::new("sk-test".into()))
            .expect("openai client");
        let chat = SlackClient::new(self.slack.uri(), SecretString::new("xoxb-test".into()))
            .expect("slack client");

        let handler = RequestHandler::new(
            RetrySuppressor::new(),
            SlackSignatureVerifier::new(SECRET),
            CompletionRequester::new(Arc::new(completions), "gpt-3.5-turbo"),
            ReplyPublisher::new(Arc::new(chat)),
        );

        create_webhook_router(Arc::new(handler))
    }
}

fn event_body(thread_ts: Option<&str>) -> String {
    let mut event = json!({
        "type": "app_mention",
        "text": "<@U12345> summarize this",
        "channel": "C1",
        "ts": "1680000000.1"
    });
    if let Some(thread_ts) = thread_ts {
        event["thread_ts"] = json!(thread_ts);
    }
    json!({"type": "event_callback", "event": event}).to_string()
}

fn slack_request(headers: Vec<(String, String)>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/slack/events")
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_signed_mention_is_answered_in_thread() {
    let upstreams = Upstreams::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "summarize this"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "A summary."}}]
        })))
        .expect(1)
        .mount(&upstreams.openai)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .and(header("authorization", "Bearer xoxb-test"))
        .and(body_partial_json(json!({
            "channel": "C1",
            "thread_ts": "1679999999.9",
            "text": "A summary.",
            "as_user": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "2.2"})))
        .expect(1)
        .mount(&upstreams.slack)
        .await;

    let body = event_body(Some("1679999999.9"));
    let headers = SlackSigner::new(SECRET).headers(body.as_bytes());
    let (status, json) = send(upstreams.router(), slack_request(headers, body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"success": true}));
}

#[tokio::test]
async fn test_completion_outage_posts_empty_reply() {
    let upstreams = Upstreams::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "The server had an error"}
        })))
        .expect(1)
        .mount(&upstreams.openai)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .and(body_partial_json(json!({"thread_ts": "1680000000.1", "text": ""})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "no_text"})))
        .expect(1)
        .mount(&upstreams.slack)
        .await;

    let body = event_body(None);
    let headers = SlackSigner::new(SECRET).headers(body.as_bytes());
    let (status, json) = send(upstreams.router(), slack_request(headers, body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"success": true}));
}

#[tokio::test]
async fn test_retry_never_reaches_upstreams() {
    let upstreams = Upstreams::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstreams.openai)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstreams.slack)
        .await;

    let body = event_body(None);
    let mut headers = SlackSigner::new(SECRET).headers(body.as_bytes());
    headers.push((RETRY_NUM_HEADER.to_string(), "1".to_string()));
    let (status, json) = send(upstreams.router(), slack_request(headers, body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"message": "No need to resend"}));
}

#[tokio::test]
async fn test_unsigned_delivery_acknowledged_with_200() {
    let upstreams = Upstreams::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstreams.openai)
        .await;

    let (status, json) = send(upstreams.router(), slack_request(Vec::new(), event_body(None))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"message": "No need to resend"}));
}

#[tokio::test]
async fn test_invoke_route_returns_function_response() {
    let upstreams = Upstreams::start().await;

    let body = r#"{"type":"url_verification","challenge":"abc123"}"#;
    let headers: std::collections::HashMap<String, String> =
        SlackSigner::new(SECRET).headers(body.as_bytes()).into_iter().collect();
    let event = json!({"headers": headers, "body": body});

    let request = Request::builder()
        .method("POST")
        .uri("/invoke")
        .header("content-type", "application/json")
        .body(Body::from(event.to_string()))
        .unwrap();
    let (status, json) = send(upstreams.router(), request).await;

    assert_eq!(status, StatusCode::OK);
    let response: WebhookResponse = serde_json::from_value(json).unwrap();
    assert_eq!(response, WebhookResponse::challenge("abc123"));
}

#[tokio::test]
async fn test_invoke_route_tolerates_garbage() {
    let upstreams = Upstreams::start().await;

    let request = Request::builder()
        .method("POST")
        .uri("/invoke")
        .body(Body::from("definitely not an event"))
        .unwrap();
    let (status, json) = send(upstreams.router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["statusCode"], 200);
    assert_eq!(json["body"], "{\"message\":\"No need to resend\"}");
}

#[tokio::test]
async fn test_oversized_bodies_acknowledged_with_200() {
    let upstreams = Upstreams::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstreams.openai)
        .await;

    let oversized = "x".repeat(3 * MAX_BODY_BYTES);
    let headers = SlackSigner::new(SECRET).headers(oversized.as_bytes());
    let (status, json) = send(upstreams.router(), slack_request(headers, oversized.clone())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"message": "No need to resend"}));

    let request = Request::builder()
        .method("POST")
        .uri("/invoke")
        .body(Body::from(oversized))
        .unwrap();
    let (status, json) = send(upstreams.router(), request).await;

    assert_eq!(status, StatusCode::OK);
    let response: WebhookResponse = serde_json::from_value(json).unwrap();
    assert_eq!(response, WebhookResponse::acknowledged());
}
