//! # OAuth Store Repository
//!
//! Data access for the internal OAuth store: refresh tokens (stored
//! hashed), single-use authorization codes, and in-flight authorization
//! sessions. Backs `POST /api/internal/oauth/…` and the refresh-token
//! lookup path on `/api/auth/oauth`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use vire_core::errors::ApiError;

use crate::domain::{AuthorizationCode, OAuthSession, RefreshToken};

#[derive(Debug, Clone)]
pub struct OAuthRepository {
    pool: PgPool,
}

impl OAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Refresh tokens
    // =========================================================================

    /// `token_hash` is the caller-supplied token's SHA-256 hex digest —
    /// lookups always hash first, the plaintext is never stored.
    pub async fn store_refresh_token(
        &self,
        token_hash: &str,
        client_id: &str,
        user_id: Uuid,
        scope: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, ApiError> {
        sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (token_hash, client_id, user_id, scope, expires_at, revoked)
            VALUES ($1, $2, $3, $4, $5, false)
            RETURNING *
            "#,
        )
        .bind(token_hash)
        .bind(client_id)
        .bind(user_id)
        .bind(scope)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::Database)
    }

    pub async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, ApiError> {
        sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::Database)
    }

    pub async fn revoke_refresh_token(&self, token_hash: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(ApiError::Database)?;
        Ok(())
    }

    pub async fn purge_expired_refresh_tokens(&self) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < now()")
            .execute(&self.pool)
            .await
            .map_err(ApiError::Database)?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Authorization codes
    // =========================================================================

    pub async fn store_authorization_code(&self, code: &AuthorizationCode) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO authorization_codes
                (code, client_id, user_id, redirect_uri, pkce_challenge, pkce_method, scope, expires_at, used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false)
            "#,
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id)
        .bind(&code.redirect_uri)
        .bind(&code.pkce_challenge)
        .bind(&code.pkce_method)
        .bind(&code.scope)
        .bind(code.expires_at)
        .execute(&self.pool)
        .await
        .map_err(ApiError::Database)?;
        Ok(())
    }

    pub async fn find_authorization_code(&self, code: &str) -> Result<Option<AuthorizationCode>, ApiError> {
        sqlx::query_as::<_, AuthorizationCode>("SELECT * FROM authorization_codes WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::Database)
    }

    /// Atomically marks a code used. Returns `Ok(false)` if the code was
    /// already used or doesn't exist — callers must treat both as a single
    /// "reject" outcome; `used` must never revert once set.
    pub async fn mark_authorization_code_used(&self, code: &str) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "UPDATE authorization_codes SET used = true WHERE code = $1 AND used = false",
        )
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(ApiError::Database)?;
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // OAuth sessions (consent-pending)
    // =========================================================================

    pub async fn create_session(&self, session: &OAuthSession) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_sessions
                (id, client_id, redirect_uri, state, pkce_challenge, pkce_method, scope, user_id, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.id)
        .bind(&session.client_id)
        .bind(&session.redirect_uri)
        .bind(&session.state)
        .bind(&session.pkce_challenge)
        .bind(&session.pkce_method)
        .bind(&session.scope)
        .bind(session.user_id)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(ApiError::Database)?;
        Ok(())
    }

    pub async fn find_session(&self, id: Uuid) -> Result<Option<OAuthSession>, ApiError> {
        sqlx::query_as::<_, OAuthSession>("SELECT * FROM oauth_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::Database)
    }

    pub async fn resolve_session_user(&self, id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE oauth_sessions SET user_id = $2 WHERE id = $1")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::Database)?;
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM oauth_sessions WHERE expires_at < now()")
            .execute(&self.pool)
            .await
            .map_err(ApiError::Database)?;
        Ok(result.rows_affected())
    }
}
