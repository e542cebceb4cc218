//! Webhook signature verification.
//!
//! The provider signs `"{t}.{body}"` with HMAC-SHA256 under the shared
//! secret and sends `t=<unix seconds>,v1=<hex digest>` in the signature
//! header. Several `v1` entries may be present while a secret is rotated.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "payment-signature";

/// How far a signed timestamp may be from now before it is refused.
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Checks that a webhook body was signed by the provider recently.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    /// A verifier for `secret`. Without a secret (or with an empty one)
    /// every notification fails with `MissingSecret`.
    pub fn new(secret: Option<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            tolerance_secs,
        }
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn verify(&self, header: Option<&str>, body: &[u8]) -> Result<()> {
        self.verify_at(header, body, Utc::now())
    }

    /// Verifies against an explicit clock.
    pub fn verify_at(&self, header: Option<&str>, body: &[u8], now: DateTime<Utc>) -> Result<()> {
        let secret = self.secret.as_deref().ok_or(PaymentError::MissingSecret)?;
        let header = header.ok_or_else(|| PaymentError::invalid_signature("missing header"))?;
        let header = SignatureHeader::parse(header)?;

        if now.timestamp().abs_diff(header.timestamp) > self.tolerance_secs {
            return Err(PaymentError::invalid_signature("timestamp outside tolerance"));
        }

        for candidate in &header.signatures {
            let mac = keyed(secret, header.timestamp, body)?;
            if mac.verify_slice(candidate).is_ok() {
                return Ok(());
            }
        }
        Err(PaymentError::invalid_signature("no matching signature"))
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("has_secret", &self.secret.is_some())
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

/// Builds the signature header value for `body` signed at `timestamp`.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> Result<String> {
    let digest = keyed(secret, timestamp, body)?.finalize().into_bytes();
    Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
}

fn keyed(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::invalid_signature("unusable secret"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|_| PaymentError::invalid_signature("bad timestamp"))?;
                    timestamp = Some(t);
                }
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                // Other schemes are not ours to check.
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| PaymentError::invalid_signature("no timestamp"))?;
        if signatures.is_empty() {
            return Err(PaymentError::invalid_signature("no v1 signature"));
        }
        Ok(Self {
            timestamp,
            signatures,
        })
    }
}
