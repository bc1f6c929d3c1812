//! Slack request signature handling
//!
//! Slack signs every delivery with HMAC-SHA256 over
//! `"v0:" + timestamp + ":" + body` and sends the result as
//! `X-Slack-Signature: v0=<lowercase hex>`, alongside
//! `X-Slack-Request-Timestamp`.

use crate::{inbound::WebhookRequest, Result, WebhookError};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret, SecretVec};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Source of "now" in seconds since the epoch
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Webhook signature configuration
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// Signature header name
    pub signature_header: String,
    /// Timestamp header name
    pub timestamp_header: String,
    /// Tolerance for timestamp validation (in seconds)
    pub timestamp_tolerance_seconds: i64,
    /// Signature version prefix
    pub version: String,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            signature_header: SIGNATURE_HEADER.to_string(),
            timestamp_header: TIMESTAMP_HEADER.to_string(),
            timestamp_tolerance_seconds: 300, // 5 minutes
            version: "v0".to_string(),
        }
    }
}

impl SignatureConfig {
    pub fn with_tolerance(mut self, seconds: i64) -> Self {
        self.timestamp_tolerance_seconds = seconds;
        self
    }
}

/// Compute `"{version}=" + hex(HMAC-SHA256(secret, "{version}:{timestamp}:{body}"))`
fn compute_signature(secret: &[u8], version: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can accept any key length");
    mac.update(version.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    format!("{}={}", version, hex::encode(mac.finalize().into_bytes()))
}

/// Signs bodies the way Slack does
///
/// Used to craft deliveries for tests and local tooling.
pub struct SlackSigner {
    secret: SecretVec<u8>,
    config: SignatureConfig,
}

impl SlackSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Secret::new(secret.as_bytes().to_vec()),
            config: SignatureConfig::default(),
        }
    }

    /// Signature for an explicit timestamp string
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        compute_signature(
            self.secret.expose_secret(),
            &self.config.version,
            timestamp,
            body,
        )
    }

    /// `(timestamp, signature)` for a point in time
    pub fn sign_at(&self, at: DateTime<Utc>, body: &[u8]) -> (String, String) {
        let timestamp = at.timestamp().to_string();
        let signature = self.sign(&timestamp, body);
        (timestamp, signature)
    }

    pub fn sign_now(&self, body: &[u8]) -> (String, String) {
        self.sign_at(Utc::now(), body)
    }

    /// Header pairs for a signed delivery
    pub fn headers(&self, body: &[u8]) -> Vec<(String, String)> {
        let (timestamp, signature) = self.sign_now(body);
        vec![
            (self.config.timestamp_header.clone(), timestamp),
            (self.config.signature_header.clone(), signature),
        ]
    }
}

/// Validates that a delivery came from Slack within the replay window
pub struct SlackSignatureVerifier {
    secret: SecretVec<u8>,
    config: SignatureConfig,
    clock: Clock,
}

impl SlackSignatureVerifier {
    pub fn new(secret: &str) -> Self {
        Self::with_config(secret, SignatureConfig::default())
    }

    pub fn with_config(secret: &str, config: SignatureConfig) -> Self {
        Self {
            secret: Secret::new(secret.as_bytes().to_vec()),
            config,
            clock: Arc::new(|| Utc::now().timestamp()),
        }
    }

    /// Replace the wall clock, e.g. to replay a recorded delivery
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Verify a delivery's signature headers against its raw body
    pub fn verify_request(&self, request: &WebhookRequest) -> Result<()> {
        let timestamp = request
            .header(&self.config.timestamp_header)
            .ok_or_else(|| WebhookError::MissingHeader(self.config.timestamp_header.clone()))?;
        let signature = request
            .header(&self.config.signature_header)
            .ok_or_else(|| WebhookError::MissingHeader(self.config.signature_header.clone()))?;

        self.verify(timestamp, signature, request.body())
    }

    /// Verify against the verifier's clock
    pub fn verify(&self, timestamp: &str, signature: &str, body: &[u8]) -> Result<()> {
        self.verify_at((self.clock)(), timestamp, signature, body)
    }

    /// Verify against an explicit "now" (seconds since epoch)
    ///
    /// The signature comparison always runs, even when the timestamp is
    /// already out of tolerance.
    pub fn verify_at(&self, now: i64, timestamp: &str, signature: &str, body: &[u8]) -> Result<()> {
        let parsed: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp(timestamp.to_string()))?;

        let expected = compute_signature(
            self.secret.expose_secret(),
            &self.config.version,
            timestamp,
            body,
        );
        let signature_matches = constant_time_compare(signature.as_bytes(), expected.as_bytes());

        let call_delay = now.abs_diff(parsed);
        let tolerance = u64::try_from(self.config.timestamp_tolerance_seconds).unwrap_or(0);

        if call_delay > tolerance {
            return Err(WebhookError::StaleTimestamp {
                delay_seconds: call_delay,
            });
        }

        if !signature_matches {
            return Err(WebhookError::SignatureMismatch);
        }

        Ok(())
    }
}

/// Constant-time comparison of a claimed value against the expected one
///
/// Runs over the full length of `expected` no matter where the first
/// difference is. A length mismatch is folded into the result instead of
/// returning early.
pub fn constant_time_compare(claimed: &[u8], expected: &[u8]) -> bool {
    let mut padded = vec![0u8; expected.len()];
    for (slot, byte) in padded.iter_mut().zip(claimed) {
        *slot = *byte;
    }

    let same_len = (claimed.len() as u64).ct_eq(&(expected.len() as u64));
    let same_bytes = padded.as_slice().ct_eq(expected);

    bool::from(same_len & same_bytes)
}
