//! # OAuth Broker
//!
//! Implements the four-state login flow `INIT → REDIRECTED → RETURNED →
//! TOKEN_ISSUED`. The enum below exists purely for span naming / tracing —
//! there is no durable state machine object; the signed state blob is the
//! only thing carried between steps (spec's Design Notes, "Provider
//! redirects are state machines, not request/response pairs").

pub mod handlers;
pub mod providers;

pub use providers::{DevProvider, GitHubProvider, GoogleProvider, OAuthProviderClient, ProviderRegistry, UserProfile};

/// Documentation/tracing-only — never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthFlowState {
    Init,
    Redirected,
    Returned,
    TokenIssued,
}

/// Rejects empty, protocol-relative, non-`http(s)`, hostless, and (outside
/// dev) plaintext-`http` callback URLs. Run at both redirect time and
/// callback time — even after state-signature verification — so a signed
/// but now-hostile URL can't slip through a configuration change.
pub fn validate_callback_url(raw: &str, is_production: bool) -> Result<(), vire_core::errors::ApiError> {
    use vire_core::errors::ApiError;

    if raw.is_empty() {
        return Err(ApiError::BadInput("callback URL is required".into()));
    }
    if raw.starts_with("//") {
        return Err(ApiError::BadInput("invalid callback URL".into()));
    }
    let parsed = reqwest::Url::parse(raw).map_err(|_| ApiError::BadInput("invalid callback URL".into()))?;
    match parsed.scheme() {
        "https" => {}
        "http" if !is_production => {}
        _ => return Err(ApiError::BadInput("invalid callback URL".into())),
    }
    if parsed.host_str().is_none() {
        return Err(ApiError::BadInput("invalid callback URL".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_is_always_accepted() {
        assert!(validate_callback_url("https://x.example/cb", true).is_ok());
        assert!(validate_callback_url("https://x.example/cb", false).is_ok());
    }

    #[test]
    fn http_is_dev_only() {
        assert!(validate_callback_url("http://localhost/cb", false).is_ok());
        assert!(validate_callback_url("http://localhost/cb", true).is_err());
    }

    #[test]
    fn javascript_scheme_is_rejected_everywhere() {
        assert!(validate_callback_url("javascript:alert(1)", false).is_err());
        assert!(validate_callback_url("javascript:alert(1)", true).is_err());
    }

    #[test]
    fn protocol_relative_is_rejected() {
        assert!(validate_callback_url("//evil.example/cb", false).is_err());
    }

    #[test]
    fn empty_is_rejected() {
        assert!(validate_callback_url("", false).is_err());
    }
}
