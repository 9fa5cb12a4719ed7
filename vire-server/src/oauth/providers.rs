//! # OAuth Provider Clients
//!
//! One small trait per provider integration point — authorization URL,
//! code-for-token exchange, and userinfo fetch — so the broker never
//! branches on provider name outside [`ProviderRegistry::get`]. `google`
//! and `github` call out over `reqwest`; `dev` is a fixed responder used
//! only outside production, for local development and integration tests.

use async_trait::async_trait;
use serde::Deserialize;
use vire_core::errors::ApiError;

/// A normalized profile, regardless of which provider produced it.
#[derive(Debug, Clone)]
pub struct UserProfile {
    /// Provider-scoped id, e.g. the numeric Google `sub` or GitHub `id`.
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
pub trait OAuthProviderClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fixed per-provider authorization URL with `client_id`, `redirect_uri`,
    /// and `state` applied.
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String;

    /// Exchanges a one-shot `code` for an access token.
    async fn exchange_code(&self, http: &reqwest::Client, code: &str, redirect_uri: &str) -> Result<String, ApiError>;

    /// Fetches the authenticated user's profile using the access token.
    async fn fetch_profile(&self, http: &reqwest::Client, access_token: &str) -> Result<UserProfile, ApiError>;
}

fn upstream_error(code: &'static str) -> ApiError {
    ApiError::UpstreamBadGateway { code }
}

// =============================================================================
// Google
// =============================================================================

pub struct GoogleProvider {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

#[async_trait]
impl OAuthProviderClient for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&state={}",
            self.client_id, redirect_uri, state
        )
    }

    async fn exchange_code(&self, http: &reqwest::Client, code: &str, redirect_uri: &str) -> Result<String, ApiError> {
        let response = http
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|_| upstream_error("exchange_failed"))?;

        if !response.status().is_success() {
            return Err(upstream_error("exchange_failed"));
        }
        response
            .json::<GoogleTokenResponse>()
            .await
            .map(|t| t.access_token)
            .map_err(|_| upstream_error("exchange_failed"))
    }

    async fn fetch_profile(&self, http: &reqwest::Client, access_token: &str) -> Result<UserProfile, ApiError> {
        let response = http
            .get("https://openidconnect.googleapis.com/v1/userinfo")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|_| upstream_error("profile_failed"))?;

        if !response.status().is_success() {
            return Err(upstream_error("profile_failed"));
        }
        let info = response
            .json::<GoogleUserInfo>()
            .await
            .map_err(|_| upstream_error("profile_failed"))?;

        Ok(UserProfile {
            external_id: format!("google_{}", info.sub),
            email: info.email,
            name: info.name,
        })
    }
}

// =============================================================================
// GitHub
// =============================================================================

pub struct GitHubProvider {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct GitHubTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GitHubUser {
    id: i64,
    email: Option<String>,
    name: Option<String>,
    login: String,
}

#[derive(Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[async_trait]
impl OAuthProviderClient for GitHubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://github.com/login/oauth/authorize?client_id={}&redirect_uri={}&scope=read:user%20user:email&state={}",
            self.client_id, redirect_uri, state
        )
    }

    async fn exchange_code(&self, http: &reqwest::Client, code: &str, redirect_uri: &str) -> Result<String, ApiError> {
        let response = http
            .post("https://github.com/login/oauth/access_token")
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|_| upstream_error("exchange_failed"))?;

        if !response.status().is_success() {
            return Err(upstream_error("exchange_failed"));
        }
        response
            .json::<GitHubTokenResponse>()
            .await
            .map(|t| t.access_token)
            .map_err(|_| upstream_error("exchange_failed"))
    }

    /// GitHub email fallback: when the primary user object has no email,
    /// issue a secondary request to `/user/emails` and take the first
    /// entry that is both primary and verified.
    async fn fetch_profile(&self, http: &reqwest::Client, access_token: &str) -> Result<UserProfile, ApiError> {
        let response = http
            .get("https://api.github.com/user")
            .bearer_auth(access_token)
            .header("User-Agent", "vire-server")
            .send()
            .await
            .map_err(|_| upstream_error("profile_failed"))?;

        if !response.status().is_success() {
            return Err(upstream_error("profile_failed"));
        }
        let mut user = response
            .json::<GitHubUser>()
            .await
            .map_err(|_| upstream_error("profile_failed"))?;

        if user.email.is_none() {
            if let Ok(resp) = http
                .get("https://api.github.com/user/emails")
                .bearer_auth(access_token)
                .header("User-Agent", "vire-server")
                .send()
                .await
            {
                if let Ok(emails) = resp.json::<Vec<GitHubEmail>>().await {
                    user.email = emails.into_iter().find(|e| e.primary && e.verified).map(|e| e.email);
                }
            }
        }

        Ok(UserProfile {
            external_id: format!("github_{}", user.id),
            email: user.email,
            name: user.name.or(Some(user.login)),
        })
    }
}

// =============================================================================
// Dev (non-production only)
// =============================================================================

/// Fixed responder for local development and integration tests. The
/// broker refuses to dispatch to this provider when `config.is_production()`
/// (spec §4.4: Forbidden).
pub struct DevProvider;

#[async_trait]
impl OAuthProviderClient for DevProvider {
    fn name(&self) -> &'static str {
        "dev"
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!("/dev/oauth/consent?redirect_uri={redirect_uri}&state={state}")
    }

    async fn exchange_code(&self, _http: &reqwest::Client, _code: &str, _redirect_uri: &str) -> Result<String, ApiError> {
        Ok("dev-access-token".to_string())
    }

    async fn fetch_profile(&self, _http: &reqwest::Client, _access_token: &str) -> Result<UserProfile, ApiError> {
        Ok(UserProfile {
            external_id: "dev_user".to_string(),
            email: Some("dev@vire.local".to_string()),
            name: Some("Dev User".to_string()),
        })
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Resolves a provider by path segment (`google`, `github`, `dev`).
#[derive(Clone)]
pub struct ProviderRegistry {
    google: Option<std::sync::Arc<GoogleProvider>>,
    github: Option<std::sync::Arc<GitHubProvider>>,
    dev: std::sync::Arc<DevProvider>,
    is_production: bool,
}

impl ProviderRegistry {
    pub fn new(oauth: &vire_core::config::OAuthConfig, is_production: bool) -> Self {
        let google = match (&oauth.google_client_id, &oauth.google_client_secret) {
            (Some(id), Some(secret)) => Some(std::sync::Arc::new(GoogleProvider {
                client_id: id.clone(),
                client_secret: secret.clone(),
            })),
            _ => None,
        };
        let github = match (&oauth.github_client_id, &oauth.github_client_secret) {
            (Some(id), Some(secret)) => Some(std::sync::Arc::new(GitHubProvider {
                client_id: id.clone(),
                client_secret: secret.clone(),
            })),
            _ => None,
        };
        Self { google, github, dev: std::sync::Arc::new(DevProvider), is_production }
    }

    pub fn get(&self, name: &str) -> Result<std::sync::Arc<dyn OAuthProviderClient>, ApiError> {
        match name {
            "google" => self
                .google
                .clone()
                .map(|p| p as std::sync::Arc<dyn OAuthProviderClient>)
                .ok_or(upstream_error("provider_not_configured")),
            "github" => self
                .github
                .clone()
                .map(|p| p as std::sync::Arc<dyn OAuthProviderClient>)
                .ok_or(upstream_error("provider_not_configured")),
            "dev" if !self.is_production => Ok(self.dev.clone() as std::sync::Arc<dyn OAuthProviderClient>),
            "dev" => Err(ApiError::Forbidden("dev provider is disabled in production".into())),
            _ => Err(ApiError::BadInput(format!("unknown provider: {name}"))),
        }
    }
}
