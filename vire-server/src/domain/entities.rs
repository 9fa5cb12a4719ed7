//! # Identity Domain Entities
//!
//! Persistent shapes backing the authentication, identity-resolution, and
//! OAuth-broker subsystem. Every entity here maps directly to a table; none
//! of them carry business logic beyond what's needed to keep an invariant
//! the spec names explicitly (single-use authorization codes, hashed refresh
//! tokens, at-most-one-row-per-provider-identity users).
//!
//! ## Entity → Table Map
//!
//! | Entity | Table | Purpose |
//! |--------|-------|---------|
//! | [`User`] | `users` | Principal storage, including service principals |
//! | [`RefreshToken`] | `refresh_tokens` | Long-lived grant, stored hashed |
//! | [`AuthorizationCode`] | `authorization_codes` | Single-use OAuth exchange token |
//! | [`OAuthSession`] | `oauth_sessions` | In-flight authorization request |
//!
//! Service principals are ordinary `users` rows with `provider = "service"`
//! and `external_id = "service:<id>"` — there is no second schema for them.
//! This piggybacks the provider/external_id uniqueness constraint the
//! find-or-create path already needs for OAuth users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored principal: an interactively-authenticated user (`email`, `dev`,
/// `google`, `github`) or a non-interactive service (`service`).
///
/// `preferences` is a small JSON document holding the KV-store-backed
/// tenant defaults the Identity Resolver falls back to when a request
/// carries no tenant headers: `portfolios` (CSV string), `display_currency`,
/// and `navexa_key` (the downstream key — never echoed verbatim, see
/// [`crate::pipeline::identity::mask_secret`]).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    /// `admin`, `user`, `service`, or absent.
    pub role: Option<String>,
    /// `email`, `dev`, `google`, `github`, or `service`.
    pub provider: String,
    /// Provider-scoped identity: `google_<id>`, `github_<id>`, `dev_user`,
    /// `service:<id>`, or the email itself for password accounts.
    pub external_id: String,
    /// Argon2id PHC string. `None` for OAuth-only and service principals.
    /// Never serialized — this type doubles as the API response body.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub preferences: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_service(&self) -> bool {
        self.provider == "service"
    }

    /// CSV-split, trimmed portfolio list from stored preferences.
    pub fn preferred_portfolios(&self) -> Vec<String> {
        self.preferences
            .get("portfolios")
            .and_then(Value::as_str)
            .map(|csv| csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn preferred_display_currency(&self) -> Option<String> {
        self.preferences.get("display_currency").and_then(Value::as_str).map(str::to_string)
    }

    pub fn preferred_navexa_key(&self) -> Option<String> {
        self.preferences.get("navexa_key").and_then(Value::as_str).map(str::to_string)
    }
}

/// Fields needed to insert a brand new [`User`] row.
pub struct NewUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub provider: String,
    pub external_id: String,
    pub password_hash: Option<String>,
}

/// A long-lived OAuth grant. The plaintext token is never stored — only
/// [`RefreshToken::token_hash`], a SHA-256 hex digest (see
/// [`vire_core::token`] hashing helper used by the OAuth repository).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token_hash: String,
    pub client_id: String,
    pub user_id: Uuid,
    pub scope: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

/// A single-use OAuth exchange token. Once [`AuthorizationCode::used`]
/// flips to `true` it must never revert.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: Uuid,
    pub redirect_uri: String,
    pub pkce_challenge: Option<String>,
    pub pkce_method: Option<String>,
    pub scope: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// An in-flight authorization request awaiting user consent.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OAuthSession {
    pub id: Uuid,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub pkce_challenge: Option<String>,
    pub pkce_method: Option<String>,
    pub scope: Option<String>,
    pub user_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}
