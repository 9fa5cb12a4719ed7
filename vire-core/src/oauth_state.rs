//! # OAuth State Blob
//!
//! The signed, short-lived correlator carried across the browser round trip
//! to an identity provider. It is the *only* durable state in the OAuth
//! broker's flow — see the broker's module docs for why no server-side
//! session table backs the redirect steps.
//!
//! ## Wire format
//!
//! ```text
//! base64url(JSON(payload)) + "." + base64url(HMAC-SHA256(secret, base64url(payload)))
//! ```
//!
//! Validation recomputes the MAC over the payload half and compares in
//! constant time before ever touching the payload's contents, so a tampered
//! byte anywhere in the blob — including in the callback URL — is caught by
//! the signature check rather than by interpreting the (possibly malicious)
//! payload first.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Ten minutes, in seconds — a blob older than this is rejected.
pub const MAX_AGE_SECONDS: i64 = 10 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatePayload {
    callback: String,
    nonce: String,
    issued_at: i64,
}

/// Signs and validates [`StatePayload`]s under a process-wide secret shared
/// with the session-token subsystem's algorithm (HMAC-SHA256) but kept as
/// a distinct secret scope.
#[derive(Clone)]
pub struct StateBlobService {
    secret: Vec<u8>,
}

impl StateBlobService {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    fn sign(&self, data: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(data);
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Mints `payload.mac` binding the given callback URL to a fresh nonce.
    pub fn sign_callback(&self, callback: &str) -> Result<String, ApiError> {
        let mut nonce_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let payload = StatePayload {
            callback: callback.to_string(),
            nonce: URL_SAFE_NO_PAD.encode(nonce_bytes),
            issued_at: Utc::now().timestamp(),
        };
        let payload_json = serde_json::to_vec(&payload)
            .map_err(|e| ApiError::Internal(format!("state blob encode failed: {e}")))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
        let mac = self.sign(payload_b64.as_bytes());
        Ok(format!("{payload_b64}.{mac}"))
    }

    /// Validates a state blob and returns the bound callback URL. A
    /// malformed blob, a bad signature, and an expired blob are all the
    /// same `BadInput("invalid state parameter")` to the caller.
    pub fn validate(&self, state: &str) -> Result<String, ApiError> {
        let (payload_b64, mac) = state
            .split_once('.')
            .ok_or_else(|| ApiError::BadInput("invalid state parameter".into()))?;

        let expected = self.sign(payload_b64.as_bytes());
        if expected.as_bytes().ct_eq(mac.as_bytes()).unwrap_u8() != 1 {
            return Err(ApiError::BadInput("invalid state parameter".into()));
        }

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| ApiError::BadInput("invalid state parameter".into()))?;
        let payload: StatePayload = serde_json::from_slice(&payload_json)
            .map_err(|_| ApiError::BadInput("invalid state parameter".into()))?;

        let age = Utc::now().timestamp() - payload.issued_at;
        if age < 0 || age > MAX_AGE_SECONDS {
            return Err(ApiError::BadInput("invalid state parameter".into()));
        }

        Ok(payload.callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> StateBlobService {
        StateBlobService::new("a-32-byte-or-longer-test-secret")
    }

    #[test]
    fn sign_then_validate_round_trips_callback() {
        let svc = service();
        let blob = svc.sign_callback("https://p.example/cb").unwrap();
        let callback = svc.validate(&blob).unwrap();
        assert_eq!(callback, "https://p.example/cb");
    }

    #[test]
    fn tampered_last_byte_is_rejected() {
        let svc = service();
        let mut blob = svc.sign_callback("https://p.example/cb").unwrap();
        let last = blob.pop().unwrap();
        let replacement = if last == 'a' { 'b' } else { 'a' };
        blob.push(replacement);
        assert!(svc.validate(&blob).is_err());
    }

    #[test]
    fn ten_minutes_exactly_is_accepted_one_second_over_is_rejected() {
        let svc = service();
        let payload = StatePayload {
            callback: "https://p.example/cb".into(),
            nonce: "n".into(),
            issued_at: Utc::now().timestamp() - MAX_AGE_SECONDS,
        };
        let payload_json = serde_json::to_vec(&payload).unwrap();
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
        let mac = svc.sign(payload_b64.as_bytes());
        let blob = format!("{payload_b64}.{mac}");
        assert!(svc.validate(&blob).is_ok());

        let payload_late = StatePayload {
            callback: "https://p.example/cb".into(),
            nonce: "n".into(),
            issued_at: Utc::now().timestamp() - MAX_AGE_SECONDS - 1,
        };
        let payload_json = serde_json::to_vec(&payload_late).unwrap();
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
        let mac = svc.sign(payload_b64.as_bytes());
        let blob = format!("{payload_b64}.{mac}");
        assert!(svc.validate(&blob).is_err());
    }
}
