//! Per-delivery orchestration
//!
//! `RECEIVED -> SUPPRESSED | REJECTED | PROCESSED`, strictly in order:
//! retry check, signature check, event extraction, completion, publish.
//! Nothing in here returns an error to the caller.

use crate::{
    events::{parse_delivery, Delivery, MessageEvent},
    inbound::{InvocationEvent, WebhookRequest, WebhookResponse},
    pipeline::{CompletionRequester, Outcome, ReplyPublisher},
    retry::{RetryAttempt, RetrySuppressor},
    signature::{SignatureConfig, SlackSignatureVerifier},
    WebhookError,
};
use relay_adapters::{ChatService, CompletionService};
use relay_core::RelayConfig;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// What became of one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Redelivery; nothing was verified or called
    Suppressed(RetryAttempt),
    /// Failed verification or could not be interpreted
    Rejected(WebhookError),
    /// Verified URL verification handshake
    Challenge(String),
    /// Verified message; completion and publish both attempted
    Processed(ProcessReport),
}

/// Trace of the downstream steps for a processed delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub channel: String,
    pub thread_ts: String,
    pub prompt: String,
    pub completion: Outcome<String>,
    pub publish: Outcome<()>,
}

impl Disposition {
    /// Wire response. Suppressed and rejected deliveries are
    /// indistinguishable here.
    pub fn to_response(&self) -> WebhookResponse {
        match self {
            Self::Suppressed(_) | Self::Rejected(_) => WebhookResponse::acknowledged(),
            Self::Challenge(challenge) => WebhookResponse::challenge(challenge),
            Self::Processed(_) => WebhookResponse::success(),
        }
    }
}

/// Handles one inbound Slack delivery end to end
pub struct RequestHandler {
    suppressor: RetrySuppressor,
    verifier: SlackSignatureVerifier,
    requester: CompletionRequester,
    publisher: ReplyPublisher,
}

impl RequestHandler {
    pub fn new(
        suppressor: RetrySuppressor,
        verifier: SlackSignatureVerifier,
        requester: CompletionRequester,
        publisher: ReplyPublisher,
    ) -> Self {
        Self {
            suppressor,
            verifier,
            requester,
            publisher,
        }
    }

    /// Wire the handler from process configuration and the two collaborators
    pub fn from_config(
        config: &RelayConfig,
        completions: Arc<dyn CompletionService>,
        chat: Arc<dyn ChatService>,
    ) -> Self {
        let signature_config =
            SignatureConfig::default().with_tolerance(config.signature_tolerance_seconds);

        Self::new(
            RetrySuppressor::new(),
            SlackSignatureVerifier::with_config(
                config.slack_signing_secret.expose_secret(),
                signature_config,
            ),
            CompletionRequester::new(completions, config.openai_model.clone()),
            ReplyPublisher::new(chat),
        )
    }

    /// Handle a delivery and produce its wire response
    pub async fn handle(&self, request: &WebhookRequest) -> WebhookResponse {
        self.process(request).await.to_response()
    }

    /// Handle a function-style invocation event
    pub async fn handle_invocation(&self, event: InvocationEvent) -> WebhookResponse {
        self.handle(&WebhookRequest::from(event)).await
    }

    /// Run a delivery through every stage and report what happened
    pub async fn process(&self, request: &WebhookRequest) -> Disposition {
        let span = info_span!("slack_delivery", invocation_id = %Uuid::new_v4());
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &WebhookRequest) -> Disposition {
        if let Some(attempt) = self.suppressor.check(request) {
            info!(
                attempt = %attempt.attempt,
                reason = attempt.reason.as_deref().unwrap_or("unknown"),
                "Suppressing redelivered event"
            );
            return Disposition::Suppressed(attempt);
        }

        if let Err(e) = self.verifier.verify_request(request) {
            warn!(error = %e, "Rejecting delivery: verification failed");
            return Disposition::Rejected(e);
        }

        let message = match parse_delivery(request.body()) {
            Ok(Delivery::Message(message)) => message,
            Ok(Delivery::UrlVerification { challenge }) => {
                info!("Answering URL verification handshake");
                return Disposition::Challenge(challenge);
            }
            Err(e) => {
                warn!(error = %e, "Rejecting delivery: unusable payload");
                return Disposition::Rejected(e);
            }
        };

        Disposition::Processed(self.answer(&message).await)
    }

    /// Completion then publish; publish runs even when completion failed
    async fn answer(&self, message: &MessageEvent) -> ProcessReport {
        let prompt = message.prompt_text();
        let thread_ts = message.reply_thread_ts().to_string();

        info!(
            event_id = message.event_id.as_deref().unwrap_or("unknown"),
            channel = %message.channel,
            thread_ts = %thread_ts,
            model = %self.requester.model(),
            "Processing message"
        );

        let completion = self.requester.request(&prompt).await;
        let reply = completion.completed().map(String::as_str).unwrap_or_default();
        let publish = self.publisher.publish(&message.channel, &thread_ts, reply).await;

        info!(
            completion_ok = completion.is_completed(),
            publish_ok = publish.is_completed(),
            "Message processed"
        );

        ProcessReport {
            channel: message.channel.clone(),
            thread_ts,
            prompt,
            completion,
            publish,
        }
    }
}
