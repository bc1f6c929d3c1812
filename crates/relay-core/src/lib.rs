//! Shared configuration for the Slack completion relay.
//!
//! Everything here is read once at process start and treated as read-only
//! afterwards; the handler receives it by injection rather than through
//! globals.

pub mod config;

pub use config::*;
