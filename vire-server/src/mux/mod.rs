//! # Hierarchical Route Mux
//!
//! Flat endpoints are registered directly on actix-web's own router (see
//! [`crate::api::routes`]); the handlers here back the routes spec.md
//! registers with a trailing `/` and dispatches on in-handler path
//! segments rather than actix-web's own pattern matcher:
//!
//! - `/api/portfolios/<name>[/<subpath>]`
//! - `/api/admin/jobs/<id>/<action>`
//! - `/api/admin/users/<id>/role`
//! - `/api/internal/oauth/...`
//! - `/api/feedback[/<id>]`
//!
//! Every handler's first move is a method gate — [`require_method`] —
//! before it ever looks at the body, per spec's per-handler contract.
//!
//! Portfolio/job/feedback business logic is a named external service
//! collaborator and out of scope here; those branches only resolve the
//! dispatch segment and acknowledge it, they don't implement portfolio,
//! job, or feedback-storage semantics. [`feedback`] is the exception worth
//! reading closely even though its storage is out of scope: the identity
//! handling around it — never trusting a body-supplied `user_id` — is
//! squarely in scope.

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use vire_core::errors::ApiError;
use vire_core::respond::{path_param, write_json};

use crate::api::handlers::update_user_role;
use crate::domain::{AuthorizationCode, OAuthSession};
use crate::pipeline::identity::TenantContext;
use crate::state::AppState;

fn ok<T: serde::Serialize>(value: &T) -> HttpResponse {
    write_json(actix_web::http::StatusCode::OK, value)
}

fn require_method(req: &HttpRequest, allowed: &'static [&'static str]) -> Result<(), ApiError> {
    if allowed.contains(&req.method().as_str()) {
        Ok(())
    } else {
        Err(ApiError::MethodNotAllowed { allowed })
    }
}

const PORTFOLIO_SUBPATHS: &[&str] = &[
    "review", "sync", "rebuild", "snapshot", "history", "report", "summary", "tickers", "strategy", "plan",
    "watchlist", "external-balances", "indicators", "cashflows", "glossary",
];
const PREFIXED_SUBPATHS: &[&str] =
    &["plan/", "reports/", "stock/", "watchlist/", "external-balances/", "cashflows/"];

/// `/api/portfolios/<name>[/<subpath>]` — dispatch only; portfolio
/// business logic is a named external collaborator, out of scope here.
pub async fn portfolios(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    require_method(&req, &["GET", "POST"])?;
    let rest = path_param(req.path(), "/api/portfolios/", None)
        .ok_or_else(|| ApiError::NotFound("unknown path".into()))?;
    let (name, subpath) = match rest.split_once('/') {
        Some((n, s)) => (n, s),
        None => (rest, ""),
    };
    if name.is_empty() {
        return Err(ApiError::NotFound("portfolio name required".into()));
    }
    let recognized = subpath.is_empty()
        || PORTFOLIO_SUBPATHS.contains(&subpath)
        || PREFIXED_SUBPATHS.iter().any(|p| subpath.starts_with(p));
    if !recognized {
        return Err(ApiError::NotFound(format!("unknown portfolio subpath: {subpath}")));
    }
    Ok(ok(&serde_json::json!({ "portfolio": name, "subpath": subpath })))
}

/// `/api/admin/jobs/<id>/<action>` — dispatch on the last segment;
/// `priority`/`cancel` are recognized, anything else is 404. Job-manager
/// business logic is out of scope here, but its liveness gate isn't: a
/// down job queue is a 503, not a 404 or a silent success.
pub async fn admin_jobs(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_method(&req, &["POST"])?;
    if !state.redis.job_queue_healthy().await {
        return Err(ApiError::Unavailable("background job manager not running".into()));
    }
    let rest = path_param(req.path(), "/api/admin/jobs/", None).ok_or_else(|| ApiError::NotFound("unknown job".into()))?;
    let mut parts = req
        .path()
        .strip_prefix("/api/admin/jobs/")
        .unwrap_or_default()
        .split('/');
    let job_id = parts.next().unwrap_or_default();
    let action = parts.next().unwrap_or_default();
    let _ = rest;

    match action {
        "priority" | "cancel" => Ok(ok(&serde_json::json!({ "job_id": job_id, "action": action }))),
        _ => Err(ApiError::NotFound(format!("unknown job action: {action}"))),
    }
}

/// `/api/admin/users/<id>/role` — role update.
pub async fn admin_user_role(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    require_method(&req, &["PATCH"])?;
    let id_str = path_param(req.path(), "/api/admin/users/", Some("/role"))
        .ok_or_else(|| ApiError::NotFound("unknown user".into()))?;
    let user_id = Uuid::parse_str(id_str).map_err(|_| ApiError::BadInput("invalid user id".into()))?;
    let payload = vire_core::respond::decode_json(&body)?;
    update_user_role(req.clone(), user_id, web::Json(payload), state).await
}

/// `/api/feedback[/<id>]` — dispatch only; feedback storage and business
/// rules are a named external collaborator, out of scope here. What isn't
/// out of scope: identity. Per spec, a handler that must attribute an
/// action reads the caller's identity from the resolved [`TenantContext`],
/// never from the request body — `user_id`/`user_name`/`user_email` in the
/// body are stripped before the payload goes anywhere near the
/// collaborator, and attribution is best-effort (no auth is required to
/// reach this handler at all, matching the source's unauthenticated
/// feedback `PATCH`).
pub async fn feedback(req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    require_method(&req, &["POST", "PATCH"])?;

    let mut payload: serde_json::Value =
        if body.is_empty() { serde_json::json!({}) } else { vire_core::respond::decode_json(&body)? };

    if let serde_json::Value::Object(ref mut fields) = payload {
        fields.remove("user_id");
        fields.remove("user_name");
        fields.remove("user_email");
    }

    let attributed_user_id = req.extensions().get::<TenantContext>().and_then(|ctx| ctx.user_id.clone());

    Ok(ok(&serde_json::json!({
        "feedback": payload,
        "attributed_user_id": attributed_user_id,
    })))
}

// =============================================================================
// /api/internal/oauth/...
// =============================================================================

/// `/api/internal/oauth/...` — dispatch to sessions/clients/codes/tokens
/// sub-handlers by segment and trailing suffix (`/used`, `/lookup`,
/// `/revoke`, `/purge`). `clients` has no backing store in this system
/// (provider credentials live in configuration, not the database) so it
/// 404s like any other unrecognized segment.
pub async fn internal_oauth(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rest = req.path().strip_prefix("/api/internal/oauth/").unwrap_or_default();
    let (segment, tail) = match rest.split_once('/') {
        Some((s, t)) => (s, t),
        None => (rest, ""),
    };

    match segment {
        "sessions" => oauth_sessions(&req, tail, &body, &state).await,
        "codes" => oauth_codes(&req, tail, &body, &state).await,
        "tokens" => oauth_tokens(&req, tail, &body, &state).await,
        _ => Err(ApiError::NotFound(format!("unknown internal oauth resource: {segment}"))),
    }
}

async fn oauth_sessions(req: &HttpRequest, tail: &str, body: &[u8], state: &AppState) -> Result<HttpResponse, ApiError> {
    if tail.is_empty() {
        require_method(req, &["POST"])?;
        let payload: OAuthSession = vire_core::respond::decode_json(body)?;
        state.oauth_store.create_session(&payload).await?;
        return Ok(ok(&payload));
    }
    if let Some(id_str) = tail.strip_suffix("/lookup") {
        require_method(req, &["GET"])?;
        let id = Uuid::parse_str(id_str).map_err(|_| ApiError::BadInput("invalid session id".into()))?;
        let session = state.oauth_store.find_session(id).await?.ok_or_else(|| ApiError::NotFound("unknown session".into()))?;
        return Ok(ok(&session));
    }
    if tail == "purge" {
        require_method(req, &["POST"])?;
        let purged = state.oauth_store.purge_expired_sessions().await?;
        return Ok(ok(&serde_json::json!({ "purged": purged })));
    }
    Err(ApiError::NotFound("unknown session operation".into()))
}

#[derive(serde::Deserialize)]
struct ResolveSessionRequest {
    user_id: Uuid,
}

async fn oauth_codes(req: &HttpRequest, tail: &str, body: &[u8], state: &AppState) -> Result<HttpResponse, ApiError> {
    if tail.is_empty() {
        require_method(req, &["POST"])?;
        let payload: AuthorizationCode = vire_core::respond::decode_json(body)?;
        state.oauth_store.store_authorization_code(&payload).await?;
        return Ok(ok(&payload));
    }
    if let Some(code) = tail.strip_suffix("/used") {
        require_method(req, &["POST"])?;
        let marked = state.oauth_store.mark_authorization_code_used(code).await?;
        return Ok(ok(&serde_json::json!({ "marked_used": marked })));
    }
    if let Some(session_id) = tail.strip_suffix("/resolve") {
        require_method(req, &["POST"])?;
        let id = Uuid::parse_str(session_id).map_err(|_| ApiError::BadInput("invalid session id".into()))?;
        let resolve: ResolveSessionRequest = vire_core::respond::decode_json(body)?;
        state.oauth_store.resolve_session_user(id, resolve.user_id).await?;
        return Ok(ok(&serde_json::json!({ "resolved": true })));
    }
    let code = tail;
    require_method(req, &["GET"])?;
    let found = state.oauth_store.find_authorization_code(code).await?.ok_or_else(|| ApiError::NotFound("unknown code".into()))?;
    Ok(ok(&found))
}

#[derive(serde::Deserialize)]
struct StoreRefreshTokenRequest {
    token: String,
    client_id: String,
    user_id: Uuid,
    scope: Option<String>,
    ttl_seconds: i64,
}

async fn oauth_tokens(req: &HttpRequest, tail: &str, body: &[u8], state: &AppState) -> Result<HttpResponse, ApiError> {
    if tail.is_empty() {
        require_method(req, &["POST"])?;
        let payload: StoreRefreshTokenRequest = vire_core::respond::decode_json(body)?;
        let hash = hash_refresh_token(&payload.token);
        let expires_at = Utc::now() + Duration::seconds(payload.ttl_seconds);
        let stored = state
            .oauth_store
            .store_refresh_token(&hash, &payload.client_id, payload.user_id, payload.scope.as_deref(), expires_at)
            .await?;
        return Ok(ok(&stored));
    }
    if let Some(token) = tail.strip_suffix("/lookup") {
        require_method(req, &["GET"])?;
        let hash = hash_refresh_token(token);
        let found = state.oauth_store.find_refresh_token(&hash).await?.ok_or_else(|| ApiError::NotFound("unknown token".into()))?;
        return Ok(ok(&found));
    }
    if let Some(token) = tail.strip_suffix("/revoke") {
        require_method(req, &["POST"])?;
        let hash = hash_refresh_token(token);
        state.oauth_store.revoke_refresh_token(&hash).await?;
        return Ok(ok(&serde_json::json!({ "revoked": true })));
    }
    if tail == "purge" {
        require_method(req, &["POST"])?;
        let purged = state.oauth_store.purge_expired_refresh_tokens().await?;
        return Ok(ok(&serde_json::json!({ "purged": purged })));
    }
    Err(ApiError::NotFound("unknown token operation".into()))
}

/// SHA-256 over the UTF-8 bytes of the token string; the hex digest is
/// what's stored and looked up, the plaintext is never persisted.
fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn feedback_ignores_spoofed_user_id_and_attributes_from_tenant_context() {
        let req = TestRequest::post().to_http_request();
        req.extensions_mut().insert(TenantContext { user_id: Some("alice".to_string()), ..Default::default() });

        let body = web::Bytes::from_static(br#"{"user_id":"spoofed","comment":"too slow"}"#);
        let res = feedback(req, body).await.unwrap();

        let bytes = actix_web::body::to_bytes(res.into_body()).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(!text.contains("spoofed"));
        assert!(text.contains("\"alice\""));
    }

    #[actix_web::test]
    async fn feedback_attributes_nothing_without_a_tenant_context() {
        let req = TestRequest::patch().to_http_request();
        let body = web::Bytes::from_static(br#"{"user_id":"spoofed"}"#);
        let res = feedback(req, body).await.unwrap();

        let bytes = actix_web::body::to_bytes(res.into_body()).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(!text.contains("spoofed"));
        assert!(text.contains("\"attributed_user_id\":null"));
    }

    #[actix_web::test]
    async fn feedback_rejects_unsupported_methods() {
        let req = TestRequest::get().to_http_request();
        let err = feedback(req, web::Bytes::new()).await.unwrap_err();
        assert_eq!(err.status_code_value(), actix_web::http::StatusCode::METHOD_NOT_ALLOWED);
    }
}
