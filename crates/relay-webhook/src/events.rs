//! Slack Events API payloads
//!
//! Only the fields the relay acts on are modelled. Anything that does not
//! resolve to a plain user message (or the URL verification handshake) is
//! reported as an error and rejected by the handler.

use crate::{Result, WebhookError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Matches one `<@...>` mention token
static MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@[^>]*>").expect("mention pattern is valid"));

const SUPPORTED_EVENT_TYPES: [&str; 2] = ["app_mention", "message"];

/// Message subtypes that still carry a user's own words
const USER_SUBTYPES: [&str; 2] = ["thread_broadcast", "file_share"];

/// Outer Events API envelope
#[derive(Debug, Clone, Deserialize)]
pub struct SlackEnvelope {
    #[serde(rename = "type", default)]
    pub envelope_type: Option<String>,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub event: Option<SlackEvent>,
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Inner event object
#[derive(Debug, Clone, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

/// A user message the relay will answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub text: String,
    pub user: Option<String>,
    /// Envelope event id, when the delivery carried one
    pub event_id: Option<String>,
}

impl MessageEvent {
    /// Thread to reply into: the parent thread if there is one, else the
    /// message itself
    pub fn reply_thread_ts(&self) -> &str {
        self.thread_ts
            .as_deref()
            .filter(|ts| !ts.is_empty())
            .unwrap_or(&self.ts)
    }

    /// Message text with mention markup removed
    pub fn prompt_text(&self) -> String {
        strip_mentions(&self.text)
    }
}

impl TryFrom<SlackEvent> for MessageEvent {
    type Error = WebhookError;

    fn try_from(event: SlackEvent) -> Result<Self> {
        if let Some(event_type) = event.event_type.as_deref() {
            if !SUPPORTED_EVENT_TYPES.contains(&event_type) {
                return Err(WebhookError::UnsupportedEvent(event_type.to_string()));
            }
        }
        if let Some(subtype) = event.subtype {
            if !USER_SUBTYPES.contains(&subtype.as_str()) {
                return Err(WebhookError::UnsupportedEvent(format!("subtype {}", subtype)));
            }
        }
        if event.bot_id.is_some() {
            return Err(WebhookError::UnsupportedEvent("bot message".to_string()));
        }

        let text = event
            .text
            .ok_or_else(|| WebhookError::InvalidPayload("event has no text".to_string()))?;
        let channel = event
            .channel
            .filter(|c| !c.is_empty())
            .ok_or_else(|| WebhookError::InvalidPayload("event has no channel".to_string()))?;
        let ts = event
            .ts
            .filter(|ts| !ts.is_empty())
            .ok_or_else(|| WebhookError::InvalidPayload("event has no ts".to_string()))?;

        Ok(Self {
            channel,
            ts,
            thread_ts: event.thread_ts,
            text,
            user: event.user,
            event_id: None,
        })
    }
}

/// What a verified body asks the relay to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Endpoint registration handshake
    UrlVerification { challenge: String },
    /// A message to answer
    Message(MessageEvent),
}

/// Parse a verified request body
pub fn parse_delivery(body: &[u8]) -> Result<Delivery> {
    let envelope: SlackEnvelope =
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    match envelope.envelope_type.as_deref() {
        Some("url_verification") => {
            let challenge = envelope.challenge.ok_or_else(|| {
                WebhookError::InvalidPayload("url_verification without challenge".to_string())
            })?;
            return Ok(Delivery::UrlVerification { challenge });
        }
        None | Some("event_callback") => {}
        Some(other) => return Err(WebhookError::UnsupportedEvent(other.to_string())),
    }

    let event = envelope
        .event
        .ok_or_else(|| WebhookError::InvalidPayload("missing event".to_string()))?;

    let mut message = MessageEvent::try_from(event)?;
    message.event_id = envelope.event_id;

    Ok(Delivery::Message(message))
}

/// Remove every `<@...>` token and trim the surrounding whitespace
pub fn strip_mentions(text: &str) -> String {
    MENTION_PATTERN.replace_all(text, "").trim().to_string()
}
