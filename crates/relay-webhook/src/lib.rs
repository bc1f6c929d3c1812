//! Slack event webhook handling for the completion relay
//!
//! One inbound delivery runs through a fixed sequence:
//! - Retry suppression: redeliveries are acknowledged and dropped
//! - Signature verification: HMAC-SHA256 over `v0:{timestamp}:{body}` with a
//!   replay window
//! - Event extraction: mention markup is stripped from the message text
//! - Completion: the text is sent as a single-turn prompt
//! - Publishing: the reply is posted into the originating thread
//!
//! Suppressed and rejected deliveries produce the same acknowledgment, so a
//! caller cannot tell a duplicate from a forged request.
//!
//! # Example
//!
//! ```rust,ignore
//! use relay_webhook::{RequestHandler, WebhookRequest};
//!
//! let handler = RequestHandler::from_config(&config, completions, chat);
//! let request = WebhookRequest::new(headers, body);
//! let response = handler.handle(&request).await;
//! assert_eq!(response.status_code, 200);
//! ```

// Module order matters due to dependencies
pub mod inbound;
pub mod events;
pub mod signature;
pub mod retry;
pub mod pipeline;
pub mod handler;

pub use inbound::*;
pub use events::*;
pub use signature::*;
pub use retry::*;
pub use pipeline::*;
pub use handler::*;

use thiserror::Error;

/// Reasons a delivery is not processed
///
/// These never reach the caller; they exist for logs and tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing header: {0}")]
    MissingHeader(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Timestamp outside tolerance: {delay_seconds} seconds difference")]
    StaleTimestamp { delay_seconds: u64 },

    #[error("Signature verification failed")]
    SignatureMismatch,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unsupported event: {0}")]
    UnsupportedEvent(String),
}

pub type Result<T> = std::result::Result<T, WebhookError>;
