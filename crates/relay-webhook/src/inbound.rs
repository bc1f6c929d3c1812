//! Inbound delivery types and HTTP routes
//!
//! A delivery is reduced to its header set and the exact body bytes before
//! anything else looks at it; the signature covers those bytes, so nothing
//! may parse and re-serialize the body ahead of verification.

use crate::handler::RequestHandler;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Largest delivery body read off the wire; anything bigger is acknowledged
/// without being handled
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// One inbound webhook delivery
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl WebhookRequest {
    pub fn new<K, V>(headers: impl IntoIterator<Item = (K, V)>, body: impl Into<Vec<u8>>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            body: body.into(),
        }
    }

    /// Build from an HTTP request as received by axum
    pub fn from_http(headers: &HeaderMap, body: &Bytes) -> Self {
        Self {
            headers: headers
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_string(),
                        String::from_utf8_lossy(v.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            body: body.to_vec(),
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Raw body bytes, exactly as delivered
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Function-style invocation event: `{ headers, body }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
}

impl From<InvocationEvent> for WebhookRequest {
    fn from(event: InvocationEvent) -> Self {
        WebhookRequest::new(
            event.headers.unwrap_or_default(),
            event.body.unwrap_or_default(),
        )
    }
}

/// Function-style response: `{ statusCode, body }`
///
/// The status is always 200; outcomes differ only in the JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl WebhookResponse {
    /// Generic acknowledgment for suppressed and rejected deliveries
    pub fn acknowledged() -> Self {
        Self::ok(serde_json::json!({ "message": "No need to resend" }))
    }

    /// Body for a processed delivery
    pub fn success() -> Self {
        Self::ok(serde_json::json!({ "success": true }))
    }

    /// Answer to Slack's URL verification handshake
    pub fn challenge(challenge: &str) -> Self {
        Self::ok(serde_json::json!({ "challenge": challenge }))
    }

    fn ok(body: serde_json::Value) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            body: body.to_string(),
        }
    }

    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            self.body,
        )
            .into_response()
    }
}

/// Create Axum router for inbound deliveries
pub fn create_webhook_router(handler: Arc<RequestHandler>) -> Router {
    Router::new()
        .route("/slack/events", post(handle_slack_event))
        .route("/invoke", post(handle_invocation))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(handler)
}

/// Raw Slack delivery: headers and body straight off the wire
async fn handle_slack_event(
    State(handler): State<Arc<RequestHandler>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> WebhookResponse {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Unreadable delivery body");
            return WebhookResponse::acknowledged();
        }
    };

    let request = WebhookRequest::from_http(&headers, &body);
    handler.handle(&request).await
}

/// Invocation-event delivery, answered with `{ statusCode, body }`
async fn handle_invocation(
    State(handler): State<Arc<RequestHandler>>,
    body: Result<Bytes, BytesRejection>,
) -> Json<WebhookResponse> {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Unreadable invocation body");
            return Json(WebhookResponse::acknowledged());
        }
    };

    let event: InvocationEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Unparsable invocation event");
            return Json(WebhookResponse::acknowledged());
        }
    };

    Json(handler.handle(&event.into()).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_lookup_ignores_case() {
        let request = WebhookRequest::new(
            vec![("X-Slack-Retry-Num", "1"), ("Content-Type", "application/json")],
            "{}",
        );

        assert_eq!(request.header("x-slack-retry-num"), Some("1"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(request.header("x-slack-signature"), None);
    }

    #[test]
    fn test_from_http_keeps_body_bytes() {
        let mut headers = HeaderMap::new();
        headers.insert("x-slack-request-timestamp", HeaderValue::from_static("1680000000"));
        let body = Bytes::from_static(b"{\"a\": 1,   \"b\":2}");

        let request = WebhookRequest::from_http(&headers, &body);
        assert_eq!(request.body(), b"{\"a\": 1,   \"b\":2}");
        assert_eq!(request.header("X-Slack-Request-Timestamp"), Some("1680000000"));
    }

    #[test]
    fn test_invocation_event_conversion() {
        let event: InvocationEvent = serde_json::from_value(serde_json::json!({
            "headers": {"x-slack-retry-num": "2"},
            "body": "{\"event\":{}}"
        }))
        .unwrap();

        let request = WebhookRequest::from(event);
        assert_eq!(request.header("x-slack-retry-num"), Some("2"));
        assert_eq!(request.body(), b"{\"event\":{}}");
    }

    #[test]
    fn test_invocation_event_without_fields() {
        let event: InvocationEvent = serde_json::from_str("{}").unwrap();
        let request = WebhookRequest::from(event);

        assert!(request.headers().is_empty());
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_response_bodies() {
        let ack = WebhookResponse::acknowledged();
        assert_eq!(ack.status_code, 200);
        assert_eq!(
            ack.json_body().unwrap(),
            serde_json::json!({"message": "No need to resend"})
        );

        let success = WebhookResponse::success();
        assert_eq!(success.status_code, 200);
        assert_eq!(success.json_body().unwrap(), serde_json::json!({"success": true}));

        let challenge = WebhookResponse::challenge("abc123");
        assert_eq!(
            challenge.json_body().unwrap(),
            serde_json::json!({"challenge": "abc123"})
        );
    }

    #[test]
    fn test_response_serializes_function_shape() {
        let json = serde_json::to_value(WebhookResponse::success()).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["body"], "{\"success\":true}");
    }
}
