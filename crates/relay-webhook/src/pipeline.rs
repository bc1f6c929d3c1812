//! Downstream steps of a verified delivery
//!
//! Neither step propagates failures. Each reports an [`Outcome`] so the
//! handler can carry on and callers can still see what degraded.

use relay_adapters::{ChatCompletionRequest, ChatService, CompletionService, PostMessageRequest};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Result of a step whose failure is tolerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Failed { reason: String },
}

impl<T> Outcome<T> {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::Failed { reason } => Some(reason),
        }
    }
}

/// Sends prompt text to the completion service
pub struct CompletionRequester {
    service: Arc<dyn CompletionService>,
    model: String,
}

impl CompletionRequester {
    pub fn new(service: Arc<dyn CompletionService>, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// First generated reply for `text`, or the reason there is none
    pub async fn request(&self, text: &str) -> Outcome<String> {
        let request = ChatCompletionRequest::single_turn(self.model.as_str(), text);

        match self.service.create_chat_completion(&request).await {
            Ok(response) => match response.first_text() {
                Some(reply) => {
                    debug!(
                        model = %self.model,
                        completion_id = response.id.as_deref().unwrap_or("unknown"),
                        finish_reason = response.first_finish_reason().unwrap_or("unknown"),
                        reply_len = reply.len(),
                        "Completion received"
                    );
                    Outcome::Completed(reply.to_string())
                }
                None => {
                    warn!(model = %self.model, "Completion response contained no text");
                    Outcome::failed("completion response contained no text")
                }
            },
            Err(e) => {
                error!(model = %self.model, error = %e, "Completion request failed");
                Outcome::failed(e.to_string())
            }
        }
    }
}

/// Posts replies into the originating thread
pub struct ReplyPublisher {
    service: Arc<dyn ChatService>,
}

impl ReplyPublisher {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self { service }
    }

    pub async fn publish(&self, channel: &str, thread_ts: &str, text: &str) -> Outcome<()> {
        let request = PostMessageRequest::threaded_reply(channel, thread_ts, text);

        match self.service.post_message(&request).await {
            Ok(response) => {
                debug!(
                    channel = %channel,
                    thread_ts = %thread_ts,
                    posted_ts = response.ts.as_deref().unwrap_or("unknown"),
                    "Reply posted"
                );
                Outcome::Completed(())
            }
            Err(e) => {
                error!(
                    channel = %channel,
                    thread_ts = %thread_ts,
                    error = %e,
                    "Failed to post reply"
                );
                Outcome::failed(e.to_string())
            }
        }
    }
}
