//! # Request Handlers
//!
//! Flat, directly-routed endpoints: user CRUD, password login/reset,
//! service-principal registration, admin user listing, and the static tool
//! catalog. The OAuth redirect/callback/exchange handlers live in
//! [`crate::oauth::handlers`] instead, since they're driven by the broker's
//! state machine rather than a single request/response pair.
//!
//! Every handler returns `Result<HttpResponse, ApiError>` — `ApiError`'s
//! `ResponseError` impl in `vire-core` takes care of the status code and
//! envelope.

use actix_web::{web, HttpRequest, HttpMessage, HttpResponse};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use vire_core::errors::ApiError;
use vire_core::respond::write_json;
use vire_core::validation::validate_request;

use crate::domain::NewUser;
use crate::pipeline::identity::Principal;
use crate::service::AuthService;
use crate::state::AppState;

use super::dto::{
    CreateUserRequest, LoginRequest, PasswordResetRequest, RegisterServiceRequest, TidyServicesRequest,
    UpdateRoleRequest, UpdateUserRequest, UpsertUserRequest,
};

fn ok<T: serde::Serialize>(value: &T) -> HttpResponse {
    write_json(actix_web::http::StatusCode::OK, value)
}

fn principal(req: &HttpRequest) -> Result<Principal, ApiError> {
    req.extensions().get::<Principal>().cloned().ok_or(ApiError::AuthMissing)
}

fn require_role(req: &HttpRequest, roles: &[&str]) -> Result<Principal, ApiError> {
    let p = principal(req)?;
    match p.role.as_deref() {
        Some(role) if roles.contains(&role) => Ok(p),
        _ => Err(ApiError::Forbidden("insufficient role".into())),
    }
}

// =============================================================================
// USERS
// =============================================================================

/// `POST /api/users` — bootstrap creation, password required.
pub async fn create_user(body: web::Json<CreateUserRequest>, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    validate_request(&*body)?;
    let password_hash = state.hasher.hash(&body.password)?;
    let user = state
        .users
        .create(NewUser {
            email: Some(body.email.clone()),
            name: body.name.clone(),
            role: Some("user".to_string()),
            provider: "email".to_string(),
            external_id: body.email.clone(),
            password_hash: Some(password_hash),
        })
        .await?;
    Ok(ok(&user))
}

/// `POST /api/users/upsert` — create-or-update by email.
pub async fn upsert_user(body: web::Json<UpsertUserRequest>, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    validate_request(&*body)?;
    let password_hash = match &body.password {
        Some(p) => Some(state.hasher.hash(p)?),
        None => None,
    };
    let user = state
        .users
        .upsert(NewUser {
            email: Some(body.email.clone()),
            name: body.name.clone(),
            role: Some("user".to_string()),
            provider: "email".to_string(),
            external_id: body.email.clone(),
            password_hash,
        })
        .await?;
    Ok(ok(&user))
}

pub async fn get_user(path: web::Path<Uuid>, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = state
        .users
        .find_by_id(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(ok(&user))
}

pub async fn update_user(
    path: web::Path<Uuid>,
    body: web::Json<UpdateUserRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user = state
        .users
        .update_profile(path.into_inner(), body.email.as_deref(), body.name.as_deref())
        .await?;
    Ok(ok(&user))
}

pub async fn delete_user(path: web::Path<Uuid>, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    state.users.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// `GET /api/users/check/{name}` — availability check; `name` is the
/// candidate email address.
pub async fn check_user_availability(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let taken = state.users.email_taken(&path.into_inner()).await?;
    Ok(ok(&serde_json::json!({ "available": !taken })))
}

// =============================================================================
// AUTH (password-based)
// =============================================================================

pub async fn login(body: web::Json<LoginRequest>, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    validate_request(&*body)?;
    let auth = AuthService::new(state.users.clone(), state.tokens.clone(), state.hasher.clone());
    let (token, user) = auth.login(&body.email, &body.password).await?;
    Ok(ok(&serde_json::json!({ "token": token, "user": user })))
}

/// `POST /api/auth/validate` — bearer verification. The pipeline's
/// `bearer_token` stage has already validated the token and attached a
/// [`Principal`] by the time this runs; an absent one means no (or a bad)
/// token was presented.
pub async fn validate(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let p = principal(&req)?;
    Ok(ok(&p))
}

pub async fn password_reset(body: web::Json<PasswordResetRequest>, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    validate_request(&*body)?;
    let auth = AuthService::new(state.users.clone(), state.tokens.clone(), state.hasher.clone());
    let user = auth.reset_password(&body.email, &body.new_password).await?;
    Ok(ok(&user))
}

// =============================================================================
// SERVICE PRINCIPALS
// =============================================================================

/// `POST /api/services/register` — gated by the shared registration key
/// carried in `X-Service-Registration-Key`, compared in constant time.
pub async fn register_service(
    req: HttpRequest,
    body: web::Json<RegisterServiceRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    validate_request(&*body)?;
    let provided = req
        .headers()
        .get("x-service-registration-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let expected = state.config.service_registration_key.as_bytes();
    if provided.as_bytes().ct_eq(expected).unwrap_u8() != 1 {
        return Err(ApiError::Forbidden("invalid service registration key".into()));
    }
    let auth = AuthService::new(state.users.clone(), state.tokens.clone(), state.hasher.clone());
    let service = auth.register_service(&body.service_id).await?;
    Ok(ok(&service))
}

/// `POST /api/admin/services/tidy` — purges service principals untouched
/// for longer than `older_than_days` (default 30).
pub async fn tidy_services(
    req: HttpRequest,
    body: web::Json<TidyServicesRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    require_role(&req, &["admin"])?;
    let purged = state.users.tidy_stale_service_principals(body.older_than_days.unwrap_or(30)).await?;
    Ok(ok(&serde_json::json!({ "purged": purged })))
}

// =============================================================================
// ADMIN
// =============================================================================

pub async fn list_users(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_role(&req, &["admin", "service"])?;
    let users = state.users.list_all().await?;
    Ok(ok(&users))
}

/// `/api/admin/users/{id}/role` is a hierarchical route (spec §4.5) and is
/// dispatched from [`crate::mux`]; this is the handler it calls into.
pub async fn update_user_role(
    req: HttpRequest,
    user_id: Uuid,
    body: web::Json<UpdateRoleRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    require_role(&req, &["admin", "service"])?;
    validate_request(&*body)?;
    let user = state.users.update_role(user_id, &body.role).await?;
    Ok(ok(&user))
}

// =============================================================================
// OPERATIONAL ENDPOINTS
// =============================================================================

/// `GET /api/health` — liveness/readiness, checking the Postgres pool and
/// Redis connection manager. Returns 503 rather than an error envelope
/// shape change when either dependency is unreachable, so load balancers
/// can key off the status code alone.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let db_ok = vire_core::database::health_check(&state.db).await.is_ok();
    let redis_ok = state.redis.ping().await.is_ok();
    let healthy = db_ok && redis_ok;

    let body = serde_json::json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "service": state.config.service_name,
        "checks": { "database": db_ok, "redis": redis_ok },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    if healthy {
        write_json(actix_web::http::StatusCode::OK, &body)
    } else {
        write_json(actix_web::http::StatusCode::SERVICE_UNAVAILABLE, &body)
    }
}

/// `GET /api/version` — build identity for deploy verification.
pub async fn version() -> HttpResponse {
    ok(&serde_json::json!({
        "service": "vire-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /api/config` — a read-only echo of non-sensitive runtime
/// configuration. Anything that is itself a credential (OAuth client
/// secrets, the token-signing secret, the service-registration key) is
/// masked with [`vire_core::validation::mask_secret`] rather than omitted
/// outright, so operators can still confirm which secret is loaded without
/// the value leaving the process.
pub async fn config(state: web::Data<AppState>) -> HttpResponse {
    use vire_core::validation::mask_secret;
    let cfg = &state.config;

    ok(&serde_json::json!({
        "environment": format!("{:?}", cfg.environment).to_lowercase(),
        "service_name": cfg.service_name,
        "server": {
            "host": cfg.server.host,
            "port": cfg.server.port,
            "public_base_url": cfg.server.public_base_url,
        },
        "token_ttl_seconds": cfg.token.ttl_seconds,
        "service_registration_key": mask_secret(&cfg.service_registration_key),
        "oauth": {
            "google_configured": cfg.oauth.google_client_id.is_some(),
            "github_configured": cfg.oauth.github_client_id.is_some(),
            "google_client_secret": cfg.oauth.google_client_secret.as_deref().map(mask_secret),
            "github_client_secret": cfg.oauth.github_client_secret.as_deref().map(mask_secret),
        },
    }))
}

/// `GET /api/diagnostics` — admin-only deeper introspection than
/// `/api/health`: per-dependency latency alongside the up/down booleans.
/// Gated the same way `/api/admin/users` is, since it exposes more about
/// the deployment's topology than a load balancer needs.
pub async fn diagnostics(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_role(&req, &["admin", "service"])?;

    let db_start = std::time::Instant::now();
    let db_ok = vire_core::database::health_check(&state.db).await.is_ok();
    let db_elapsed_ms = db_start.elapsed().as_millis();

    let redis_start = std::time::Instant::now();
    let redis_ok = state.redis.ping().await.is_ok();
    let redis_elapsed_ms = redis_start.elapsed().as_millis();

    Ok(ok(&serde_json::json!({
        "service": state.config.service_name,
        "environment": format!("{:?}", state.config.environment).to_lowercase(),
        "database": { "ok": db_ok, "elapsed_ms": db_elapsed_ms },
        "redis": { "ok": redis_ok, "elapsed_ms": redis_elapsed_ms },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

// =============================================================================
// MCP TOOL CATALOG
// =============================================================================

/// `GET /api/mcp/tools` — a static catalog. Every tool has a non-empty
/// name/description/method/path; every param's `in` is `path`, `query`, or
/// `body`.
pub async fn mcp_tools() -> HttpResponse {
    ok(&serde_json::json!({
        "tools": [
            {
                "name": "get_user",
                "description": "Fetch a user by id",
                "method": "GET",
                "path": "/api/users/{id}",
                "params": [
                    { "name": "id", "type": "string", "description": "User id", "in": "path", "required": true }
                ]
            },
            {
                "name": "login",
                "description": "Password login, returns a session token",
                "method": "POST",
                "path": "/api/auth/login",
                "params": [
                    { "name": "email", "type": "string", "description": "Account email", "in": "body", "required": true },
                    { "name": "password", "type": "string", "description": "Account password", "in": "body", "required": true }
                ]
            },
            {
                "name": "register_service",
                "description": "Register a non-interactive service principal",
                "method": "POST",
                "path": "/api/services/register",
                "params": [
                    { "name": "service_id", "type": "string", "description": "Service identifier", "in": "body", "required": true }
                ]
            }
        ]
    }))
}
