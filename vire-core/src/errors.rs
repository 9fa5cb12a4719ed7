//! # Application Error Types
//!
//! Unified error handling for the identity/dispatch subsystem with automatic
//! HTTP conversion.
//!
//! ## Error Categories
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ApiError Categories                             │
//! ├─────────────────────────┬───────────────────┬────────────────────────────┤
//! │ AuthMissing   (401)     │ Forbidden   (403) │ BadInput      (400)        │
//! │ AuthInvalid   (401)     │                   │ NotFound      (404)        │
//! │ MethodNotAllowed (405)  │ Conflict    (409) │ UpstreamBadGateway (502)   │
//! │ Unavailable   (503)     │ Internal    (500) │                            │
//! └─────────────────────────┴───────────────────┴────────────────────────────┘
//! ```
//!
//! `AuthInvalid` is deliberately coarse: per the token subsystem's anti-oracle
//! requirement, callers never learn whether a credential was wrong, a
//! signature was bad, or a token had expired — the body is byte-identical in
//! all three cases.
//!
//! ## HTTP Response Format
//!
//! ```json
//! {"error": "invalid or expired token"}
//! {"error": "ticker must look like BHP.AU", "code": "BAD_INPUT"}
//! ```
//!
//! `code` is only present when the error carries a machine-readable code
//! beyond what the HTTP status already says (mainly `UpstreamBadGateway`'s
//! provider failure codes: `exchange_failed`, `profile_failed`,
//! `user_creation_failed`, `token_failed`, `provider_not_configured`).
//!
//! ## Framework Integration
//!
//! `impl ResponseError for ApiError` lets any handler return
//! `Result<T, ApiError>` directly; status code, `Allow`, and
//! `WWW-Authenticate` headers are all attached here rather than scattered
//! across handlers.

use actix_web::http::header::{HeaderValue, ALLOW, WWW_AUTHENTICATE};
use actix_web::{http::StatusCode, HttpResponse, HttpResponseBuilder, ResponseError};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::token::ISSUER;

/// Result type alias for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

/// The fixed, non-distinguishing message for any bearer-token failure.
pub const INVALID_TOKEN_MESSAGE: &str = "invalid or expired token";

/// The fixed, non-distinguishing message for any password-login failure.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid credentials";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bearer token required and absent, or a session was expected but
    /// never attached. Returns 401.
    #[error("authentication required")]
    AuthMissing,

    /// Token or password-login credentials are bad. The message is always
    /// one of the two constants above — never a more specific one.
    /// Returns 401, with `WWW-Authenticate: Bearer ...` when `is_bearer`.
    #[error("{message}")]
    AuthInvalid { message: &'static str, is_bearer: bool },

    /// Authenticated, but the role/principal may not do this. Covers role
    /// gates, a service principal attempting interactive login, and the
    /// dev OAuth provider outside of development.
    /// Returns 403.
    #[error("{0}")]
    Forbidden(String),

    /// Malformed or semantically invalid input: body decode failure,
    /// missing field, bad ticker, unknown provider, invalid callback URL.
    /// Returns 400.
    #[error("{0}")]
    BadInput(String),

    /// Unknown path suffix, unknown user, unknown portfolio, unknown
    /// feedback id. Returns 404.
    #[error("{0}")]
    NotFound(String),

    /// Action would violate a uniqueness constraint (user already exists).
    /// Returns 409.
    #[error("{0}")]
    Conflict(String),

    /// Method gate failure. `allowed` becomes the `Allow:` header.
    /// Returns 405.
    #[error("method not allowed")]
    MethodNotAllowed { allowed: &'static [&'static str] },

    /// A required background collaborator (job manager, Redis) is down.
    /// Returns 503.
    #[error("{0}")]
    Unavailable(String),

    /// An OAuth provider exchange failed. `code` is one of
    /// `exchange_failed`, `profile_failed`, `user_creation_failed`,
    /// `token_failed`, `provider_not_configured`.
    /// Returns 502.
    #[error("upstream provider error: {code}")]
    UpstreamBadGateway { code: &'static str },

    /// Recovered panic, or a storage failure not otherwise classified.
    /// Returns 500. The underlying cause is logged, never echoed.
    #[error("internal server error")]
    Internal(String),

    #[error("validation error")]
    Validation(#[from] ValidationErrors),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl ApiError {
    pub fn invalid_token() -> Self {
        Self::AuthInvalid { message: INVALID_TOKEN_MESSAGE, is_bearer: true }
    }

    pub fn invalid_credentials() -> Self {
        Self::AuthInvalid { message: INVALID_CREDENTIALS_MESSAGE, is_bearer: false }
    }

    pub fn status_code_value(&self) -> StatusCode {
        match self {
            Self::AuthMissing | Self::AuthInvalid { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadInput(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamBadGateway { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal(_) | Self::Database(_) | Self::Redis(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable code surfaced in the JSON body, when one is
    /// warranted beyond the HTTP status.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::UpstreamBadGateway { code } => Some(code),
            _ => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Database(_) | Self::Redis(_))
    }

    /// The body text never leaks storage internals; database and redis
    /// failures collapse to a fixed message regardless of the driver error.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Redis(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status_code_value()
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_server_error() {
            tracing::error!(error = %self, "internal failure");
        }

        let mut builder: HttpResponseBuilder = HttpResponse::build(self.status_code_value());

        if let Self::MethodNotAllowed { allowed } = self {
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                builder.insert_header((ALLOW, value));
            }
        }

        if let Self::AuthInvalid { is_bearer: true, .. } = self {
            let header = format!(
                "Bearer error=\"invalid_token\", error_description=\"{}\", resource_metadata=\"{}/.well-known/oauth-protected-resource\"",
                INVALID_TOKEN_MESSAGE, ISSUER,
            );
            if let Ok(value) = HeaderValue::from_str(&header) {
                builder.insert_header((WWW_AUTHENTICATE, value));
            }
        }

        builder.json(ErrorBody { error: self.public_message(), code: self.code() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_invalid_messages_are_indistinguishable() {
        let bad_sig = ApiError::invalid_token();
        let expired = ApiError::invalid_token();
        assert_eq!(bad_sig.to_string(), expired.to_string());
        assert_eq!(bad_sig.to_string(), INVALID_TOKEN_MESSAGE);
    }

    #[test]
    fn login_enumeration_message_is_fixed() {
        assert_eq!(ApiError::invalid_credentials().to_string(), INVALID_CREDENTIALS_MESSAGE);
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ApiError::AuthMissing.status_code_value(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status_code_value(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::BadInput("x".into()).status_code_value(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status_code_value(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status_code_value(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::MethodNotAllowed { allowed: &["GET"] }.status_code_value(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(ApiError::Unavailable("x".into()).status_code_value(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::UpstreamBadGateway { code: "exchange_failed" }.status_code_value(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::Internal("x".into()).status_code_value(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn database_and_redis_errors_are_masked() {
        let db_err = ApiError::Database(sqlx::Error::RowNotFound);
        assert_eq!(db_err.public_message(), "Internal server error");
    }

    #[test]
    fn database_error_display_carries_the_underlying_text_for_logging() {
        let db_err = ApiError::Database(sqlx::Error::RowNotFound);
        // Never sent to the client (see `public_message`), but this is what
        // `tracing::error!(error = %self, ...)` logs server-side.
        assert!(db_err.to_string().contains("no rows"));
    }
}
