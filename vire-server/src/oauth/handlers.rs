//! # OAuth Broker Handlers
//!
//! `GET /api/auth/login/<provider>` (INIT → REDIRECTED), `GET
//! /api/auth/callback/<provider>` (REDIRECTED → RETURNED → TOKEN_ISSUED),
//! and the JSON-exchange sibling `POST /api/auth/oauth` that performs the
//! same code exchange without ever redirecting a browser.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use vire_core::errors::ApiError;
use vire_core::respond::write_json;

use crate::domain::{NewUser, User};
use crate::oauth::providers::UserProfile;
use crate::oauth::validate_callback_url;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub callback: String,
}

/// `INIT → REDIRECTED`.
pub async fn login(
    path: web::Path<String>,
    query: web::Query<LoginQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let provider_name = path.into_inner();
    validate_callback_url(&query.callback, state.config.is_production())?;

    let provider = state.providers.get(&provider_name)?;
    let blob = state.state_blobs.sign_callback(&query.callback)?;
    let redirect_uri = callback_url(&state, &provider_name);
    let authorize_url = provider.authorization_url(&redirect_uri, &blob);

    Ok(HttpResponse::Found()
        .append_header(("Location", authorize_url))
        .finish())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// `REDIRECTED → RETURNED → TOKEN_ISSUED`.
pub async fn callback(
    path: web::Path<String>,
    query: web::Query<CallbackQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let provider_name = path.into_inner();

    // Branch (a): provider reported an error. Recover the callback from
    // state and forward the error; an invalid state is still a 400.
    if let Some(provider_error) = &query.error {
        let raw_state = query.state.as_deref().unwrap_or_default();
        let callback = state.state_blobs.validate(raw_state)?;
        let redirect = append_query(&callback, "error", provider_error);
        return Ok(HttpResponse::Found().append_header(("Location", redirect)).finish());
    }

    // Branch (b): absent `error`, a state decode failure is a plain 400.
    let raw_state = query.state.as_deref().ok_or_else(|| ApiError::BadInput("missing state parameter".into()))?;
    let callback = state.state_blobs.validate(raw_state)?;
    let code = query.code.as_deref().ok_or_else(|| ApiError::BadInput("missing code parameter".into()))?;

    match finish_exchange(&state, &provider_name, code, &callback).await {
        Ok(token) => {
            validate_callback_url(&callback, state.config.is_production())?;
            let redirect = append_query(&callback, "token", &token);
            Ok(HttpResponse::Found().append_header(("Location", redirect)).finish())
        }
        Err(code) => {
            let redirect = append_query(&callback, "error", code);
            Ok(HttpResponse::Found().append_header(("Location", redirect)).finish())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OAuthExchangeRequest {
    pub provider: String,
    pub code: String,
}

/// `POST /api/auth/oauth` — same code exchange, JSON response instead of a
/// redirect. `dev` is only honored outside production.
pub async fn exchange(body: web::Bytes, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let payload: OAuthExchangeRequest = vire_core::respond::decode_json(&body)?;

    let provider = state.providers.get(&payload.provider)?;
    let redirect_uri = callback_url(&state, &payload.provider);
    let access_token = provider
        .exchange_code(&state.http, &payload.code, &redirect_uri)
        .await
        .map_err(|_| ApiError::UpstreamBadGateway { code: "exchange_failed" })?;
    let profile = provider
        .fetch_profile(&state.http, &access_token)
        .await
        .map_err(|_| ApiError::UpstreamBadGateway { code: "profile_failed" })?;

    let default_role = if payload.provider == "dev" { "admin" } else { "user" };
    let user = find_or_create_user(&state, &payload.provider, &profile, default_role)
        .await
        .ok_or(ApiError::UpstreamBadGateway { code: "user_creation_failed" })?;

    let token = mint_session_token(&state, &user, &payload.provider)
        .map_err(|_| ApiError::UpstreamBadGateway { code: "token_failed" })?;

    Ok(write_json(actix_web::http::StatusCode::OK, &serde_json::json!({ "token": token, "user": user })))
}

/// Runs exchange → profile → find-or-create → mint, returning the
/// provider-facing error code on any step's failure (spec's fixed set:
/// `exchange_failed`, `profile_failed`, `user_creation_failed`,
/// `token_failed`, `provider_not_configured`).
async fn finish_exchange(
    state: &AppState,
    provider_name: &str,
    code: &str,
    callback: &str,
) -> Result<String, &'static str> {
    let provider = state.providers.get(provider_name).map_err(|_| "provider_not_configured")?;
    let redirect_uri = callback_url(state, provider_name);

    let access_token = provider
        .exchange_code(&state.http, code, &redirect_uri)
        .await
        .map_err(|_| "exchange_failed")?;
    let profile = provider
        .fetch_profile(&state.http, &access_token)
        .await
        .map_err(|_| "profile_failed")?;

    let default_role = if provider_name == "dev" { "admin" } else { "user" };
    let user = find_or_create_user(state, provider_name, &profile, default_role)
        .await
        .ok_or("user_creation_failed")?;

    let _ = callback;
    mint_session_token(state, &user, provider_name).map_err(|_| "token_failed")
}

fn mint_session_token(state: &AppState, user: &User, provider: &str) -> Result<String, ApiError> {
    state.tokens.mint(vire_core::token::NewSessionToken {
        subject: &user.id.to_string(),
        email: user.email.as_deref(),
        name: user.name.as_deref(),
        role: user.role.as_deref(),
        provider,
        client_id: None,
        scope: None,
    })
}

/// Find-or-create an internal user, preserving the invariant that at most
/// one stored user exists per provider-id:
///
/// 1. Look up by the provider-scoped id. If found, update email/name when
///    changed and return.
/// 2. Else, if an email was provided, look up by email (account linking).
///    If found, update the name when changed and return.
/// 3. Else, create a new user with `default_role`.
async fn find_or_create_user(
    state: &AppState,
    provider: &str,
    profile: &UserProfile,
    default_role: &str,
) -> Option<User> {
    if let Ok(Some(existing)) = state.users.find_by_provider_identity(provider, &profile.external_id).await {
        let email_changed = profile.email.is_some() && profile.email != existing.email;
        let name_changed = profile.name.is_some() && profile.name != existing.name;
        if email_changed || name_changed {
            return state
                .users
                .update_profile(existing.id, profile.email.as_deref(), profile.name.as_deref())
                .await
                .ok();
        }
        return Some(existing);
    }

    if let Some(email) = &profile.email {
        if let Ok(Some(existing)) = state.users.find_by_email(email).await {
            if profile.name.is_some() && profile.name != existing.name {
                return state.users.update_profile(existing.id, None, profile.name.as_deref()).await.ok();
            }
            return Some(existing);
        }
    }

    state
        .users
        .create(NewUser {
            email: profile.email.clone(),
            name: profile.name.clone(),
            role: Some(default_role.to_string()),
            provider: provider.to_string(),
            external_id: profile.external_id.clone(),
            password_hash: None,
        })
        .await
        .ok()
}

fn callback_url(state: &AppState, provider: &str) -> String {
    format!("{}/api/auth/callback/{}", state.config.server.public_base_url, provider)
}

fn append_query(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{key}={}", urlencoding_minimal(value))
}

/// Percent-encodes the handful of characters that would otherwise break a
/// query string (space, `&`, `#`, `%`); callback/error/token values never
/// need full RFC 3986 coverage here.
fn urlencoding_minimal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'&' | b'#' | b'%' | b' ' => out.push_str(&format!("%{byte:02X}")),
            _ => out.push(byte as char),
        }
    }
    out
}
