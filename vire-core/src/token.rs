//! # Session Token Subsystem
//!
//! Mints and validates the signed bearer credential ("SessionToken") that
//! authenticates every tenant request, and the constant-time HMAC machinery
//! it shares with the OAuth state blob (see [`crate::oauth_state`]).
//!
//! ## Why not `jsonwebtoken`?
//!
//! A session token's wire format is still three base64url parts joined by
//! dots, so any JWT-aware tooling on the client side keeps working. But
//! validation here owns the algorithm field itself rather than delegating to
//! a general-purpose decoder: a token that claims `alg: none` or an RSA
//! algorithm must be rejected outright, which is easiest to guarantee by
//! never accepting anything but the HMAC-SHA256 signature this module
//! produces. `jsonwebtoken` remains a workspace dependency for any future
//! need to *inspect* a third-party JWT (an OAuth provider's own token), but
//! session tokens are signed and parsed by hand here.
//!
//! ## Claims
//!
//! | Claim | Meaning |
//! |-------|---------|
//! | `sub` | user id |
//! | `email` | optional |
//! | `name` | optional display name |
//! | `role` | `admin` / `user` / `service` / absent |
//! | `provider` | `email`, `dev`, `google`, `github`, `service` |
//! | `client_id` | present only for OAuth-issued tokens |
//! | `scope` | present only for OAuth-issued tokens |
//! | `iss` | fixed to [`ISSUER`] |
//! | `iat` / `exp` | Unix seconds |
//! | `jti` | opaque id, unique per mint |
//!
//! Validation never distinguishes "expired" from "bad signature" from "bad
//! claims" in anything a caller can observe — see [`crate::errors::ApiError::invalid_token`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::errors::ApiError;

/// Fixed issuer claim for every session token this server mints.
pub const ISSUER: &str = "vire-server";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokenClaims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl SessionTokenClaims {
    /// Remaining lifetime as a fraction of the total `(exp - iat)` window.
    /// Used by the bearer pipeline stage to decide whether to slide-refresh.
    pub fn remaining_fraction(&self, now: i64) -> f64 {
        let total = (self.exp - self.iat).max(1) as f64;
        let remaining = (self.exp - now).max(0) as f64;
        remaining / total
    }
}

/// What goes into a freshly minted token; distinct from [`SessionTokenClaims`]
/// because callers never supply `iss`, `iat`, `jti` themselves.
pub struct NewSessionToken<'a> {
    pub subject: &'a str,
    pub email: Option<&'a str>,
    pub name: Option<&'a str>,
    pub role: Option<&'a str>,
    pub provider: &'a str,
    pub client_id: Option<&'a str>,
    pub scope: Option<&'a str>,
}

/// Issues and verifies session tokens under a single process-wide secret.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    ttl_seconds: i64,
}

impl TokenService {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_seconds: i64) -> Self {
        Self { secret: secret.into(), ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mints a compact `header.payload.signature` session token.
    pub fn mint(&self, new: NewSessionToken<'_>) -> Result<String, ApiError> {
        let now = Utc::now().timestamp();
        let claims = SessionTokenClaims {
            sub: new.subject.to_string(),
            email: new.email.map(str::to_string),
            name: new.name.map(str::to_string),
            role: new.role.map(str::to_string),
            provider: new.provider.to_string(),
            client_id: new.client_id.map(str::to_string),
            scope: new.scope.map(str::to_string),
            iss: ISSUER.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
            jti: Uuid::new_v4(),
        };
        self.encode(&claims)
    }

    /// Re-mints a token carrying identical subject/claims but a fresh
    /// `iat`/`exp`/`jti`, used by the bearer pipeline's sliding-expiry path.
    pub fn reissue(&self, claims: &SessionTokenClaims) -> Result<String, ApiError> {
        self.mint(NewSessionToken {
            subject: &claims.sub,
            email: claims.email.as_deref(),
            name: claims.name.as_deref(),
            role: claims.role.as_deref(),
            provider: &claims.provider,
            client_id: claims.client_id.as_deref(),
            scope: claims.scope.as_deref(),
        })
    }

    fn encode(&self, claims: &SessionTokenClaims) -> Result<String, ApiError> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload_json = serde_json::to_vec(claims)
            .map_err(|e| ApiError::Internal(format!("token encode failed: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(payload_json);
        let signing_input = format!("{header}.{payload}");
        let signature = self.sign(signing_input.as_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    fn sign(&self, data: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(data);
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Validates a compact token: rejects anything that does not declare
    /// `alg: HS256`, recomputes and compares the signature in constant
    /// time, and enforces `exp` against the current time. Every failure
    /// collapses to the same [`ApiError::invalid_token`].
    pub fn validate(&self, token: &str) -> Result<SessionTokenClaims, ApiError> {
        let mut parts = token.split('.');
        let (header_b64, payload_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(ApiError::invalid_token()),
            };

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| ApiError::invalid_token())?;
        let header: serde_json::Value =
            serde_json::from_slice(&header_json).map_err(|_| ApiError::invalid_token())?;
        if header.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
            return Err(ApiError::invalid_token());
        }

        let signing_input = format!("{header_b64}.{payload_b64}");
        let expected = self.sign(signing_input.as_bytes());
        if expected.as_bytes().ct_eq(signature_b64.as_bytes()).unwrap_u8() != 1 {
            return Err(ApiError::invalid_token());
        }

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| ApiError::invalid_token())?;
        let claims: SessionTokenClaims =
            serde_json::from_slice(&payload_json).map_err(|_| ApiError::invalid_token())?;

        if claims.sub.is_empty() {
            return Err(ApiError::invalid_token());
        }
        if claims.exp < Utc::now().timestamp() {
            return Err(ApiError::invalid_token());
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("a-32-byte-or-longer-test-secret", 3600)
    }

    fn new_token<'a>(subject: &'a str) -> NewSessionToken<'a> {
        NewSessionToken {
            subject,
            email: Some("a@example.com"),
            name: Some("Alice"),
            role: Some("user"),
            provider: "email",
            client_id: None,
            scope: None,
        }
    }

    #[test]
    fn sign_then_validate_round_trips() {
        let svc = service();
        let token = svc.mint(new_token("u1")).unwrap();
        let claims = svc.validate(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = TokenService::new("a-32-byte-or-longer-test-secret", -1);
        let token = svc.mint(new_token("u1")).unwrap();
        assert!(svc.validate(&token).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let svc = service();
        let other = TokenService::new("a-different-32-byte-test-secret", 3600);
        let token = svc.mint(new_token("u1")).unwrap();
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn tampered_alg_header_is_rejected() {
        let svc = service();
        let token = svc.mint(new_token("u1")).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let owned = none_header;
        parts[0] = &owned;
        let forged = parts.join(".");
        assert!(svc.validate(&forged).is_err());
    }

    #[test]
    fn invalid_and_expired_errors_are_indistinguishable() {
        let svc = service();
        let expired_svc = TokenService::new("a-32-byte-or-longer-test-secret", -1);
        let expired = expired_svc.mint(new_token("u1")).unwrap();
        let garbage = "not-a-token";

        let e1 = svc.validate(&expired).unwrap_err();
        let e2 = svc.validate(garbage).unwrap_err();
        assert_eq!(e1.to_string(), e2.to_string());
    }

    #[test]
    fn reissue_keeps_subject_and_advances_expiry() {
        let svc = service();
        let token = svc.mint(new_token("u1")).unwrap();
        let claims = svc.validate(&token).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let reissued = svc.reissue(&claims).unwrap();
        let new_claims = svc.validate(&reissued).unwrap();
        assert_eq!(new_claims.sub, claims.sub);
        assert!(new_claims.iat >= claims.iat);
    }
}
