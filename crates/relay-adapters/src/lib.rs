//! Collaborator adapters for the Slack completion relay
//!
//! Two narrow interfaces sit at the edge of the relay:
//! - [`CompletionService`]: single-turn chat completion
//! - [`ChatService`]: threaded message posting
//!
//! Each has an HTTP implementation ([`OpenAiClient`], [`SlackClient`]).
//! Neither retries; callers decide what a failure means.

pub mod openai;
pub mod slack;

pub use openai::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, CompletionService, OpenAiClient,
};
pub use slack::{ChatService, PostMessageRequest, PostMessageResponse, SlackClient};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Service error: {0}")]
    Service(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Join a configured base URL with an API path
pub(crate) fn endpoint(base_url: &str, path: &str) -> AdapterResult<url::Url> {
    let base = url::Url::parse(base_url)
        .map_err(|e| AdapterError::Configuration(format!("invalid base URL {}: {}", base_url, e)))?;
    base.join(path)
        .map_err(|e| AdapterError::Configuration(format!("invalid path {}: {}", path, e)))
}
