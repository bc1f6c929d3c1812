//! Redelivery suppression
//!
//! Slack redelivers an event when the first attempt was slow or failed,
//! marking the attempt with `X-Slack-Retry-Num`. Completions and posts are
//! not idempotent, so any marked delivery is dropped before verification.

use crate::inbound::WebhookRequest;

pub const RETRY_NUM_HEADER: &str = "x-slack-retry-num";
pub const RETRY_REASON_HEADER: &str = "x-slack-retry-reason";

/// A detected redelivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// Raw header value; not interpreted
    pub attempt: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RetrySuppressor;

impl RetrySuppressor {
    pub fn new() -> Self {
        Self
    }

    /// Presence of the header is enough, whatever its value
    pub fn check(&self, request: &WebhookRequest) -> Option<RetryAttempt> {
        request.header(RETRY_NUM_HEADER).map(|attempt| RetryAttempt {
            attempt: attempt.to_string(),
            reason: request.header(RETRY_REASON_HEADER).map(String::from),
        })
    }
}
