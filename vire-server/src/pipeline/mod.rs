//! # Request Pipeline
//!
//! Every request passes through a fixed, ordered stack: Recovery → CORS →
//! BearerToken → TenantHeader → Correlation → Logging → handler. The order
//! is a design contract, not an accident — see each function's doc comment
//! for what it does and why it sits where it does.
//!
//! Built on `actix_web::middleware::from_fn` rather than hand-rolled
//! `Transform`/`Service` impls — the teacher's auth-service wired its
//! middleware the same way, via small async functions around `next.call`,
//! which is the idiomatic shape for linear request-scoped logic in modern
//! actix-web.
//!
//! ## Wiring order
//!
//! `actix_web`'s `.wrap()` stacks middleware so that the *last* `.wrap()`
//! call becomes the *outermost* layer. To get Recovery outermost and
//! Logging innermost, [`crate::main`] must call `.wrap()` in this order:
//! `logging, correlation, tenant_header, bearer_token, cors, recovery` —
//! the reverse of the data-flow order above.

pub mod identity;

use actix_cors::Cors;
use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::middleware::Next;
use actix_web::{http, web, Error, HttpMessage, HttpResponse};
use futures_util::FutureExt;
use std::time::Instant;
use uuid::Uuid;
use vire_core::errors::ApiError;

use crate::state::AppState;
use identity::{Principal, TenantContext};

/// Permissive cross-origin policy: any origin, the method set handlers
/// actually use, and the tenant/correlation headers the rest of the
/// pipeline reads. `OPTIONS` short-circuits with 204 — `actix-cors`
/// handles that natively.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers([
            http::header::AUTHORIZATION,
            http::header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-correlation-id"),
            HeaderName::from_static("x-vire-portfolios"),
            HeaderName::from_static("x-vire-display-currency"),
            HeaderName::from_static("x-vire-navexa-key"),
            HeaderName::from_static("x-vire-user-id"),
            HeaderName::from_static("x-vire-service-id"),
        ])
        .max_age(3600)
}

/// Catches panics from the entire inner chain and turns them into a
/// structured 500 instead of letting them escape as a connection reset. No
/// failure leaks past this boundary.
pub async fn recovery(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let http_req = req.request().clone();
    let path = req.path().to_string();

    match std::panic::AssertUnwindSafe(next.call(req)).catch_unwind().await {
        Ok(Ok(res)) => Ok(res.map_into_boxed_body()),
        Ok(Err(e)) => Err(e),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(path = %path, panic = %message, "recovered panic");
            let response = HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": "Internal server error" }))
                .map_into_boxed_body();
            Ok(ServiceResponse::new(http_req, response))
        }
    }
}

/// Validates a bearer token if present, looks the subject up in the user
/// store, and attaches a [`Principal`] + [`TenantContext`] to the request.
/// A missing `Authorization` header is not an error — the next layer
/// resolves whatever identity it can from tenant headers instead.
pub async fn bearer_token(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let raw_token = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let Some(raw_token) = raw_token else {
        return Ok(next.call(req).await?.map_into_boxed_body());
    };

    let state = req
        .app_data::<web::Data<AppState>>()
        .expect("AppState not configured")
        .clone();

    let claims = match state.tokens.validate(&raw_token) {
        Ok(c) => c,
        Err(err) => return Ok(short_circuit(&req, err)),
    };

    let Ok(subject) = Uuid::parse_str(&claims.sub) else {
        return Ok(short_circuit(&req, ApiError::invalid_token()));
    };

    let user = match state.users.find_by_id(subject).await {
        Ok(Some(u)) => u,
        _ => return Ok(short_circuit(&req, ApiError::invalid_token())),
    };

    let principal = Principal {
        user_id: user.id,
        role: user.role.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        provider: claims.provider.clone(),
    };
    let tenant = TenantContext {
        user_id: Some(user.id.to_string()),
        role: user.role.clone(),
        portfolios: user.preferred_portfolios(),
        display_currency: user.preferred_display_currency(),
        navexa_key: user.preferred_navexa_key(),
    };

    let now = chrono::Utc::now().timestamp();
    let needs_reissue = claims.remaining_fraction(now) < 0.5;
    let reissued = needs_reissue.then(|| state.tokens.reissue(&claims).ok()).flatten();

    req.extensions_mut().insert(principal);
    req.extensions_mut().insert(tenant);

    let mut res = next.call(req).await?.map_into_boxed_body();
    if let Some(new_token) = reissued {
        let headers = res.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&new_token) {
            headers.insert(HeaderName::from_static("x-new-access-token"), value);
        }
        if let Ok(value) = HeaderValue::from_str(&state.tokens.ttl_seconds().to_string()) {
            headers.insert(HeaderName::from_static("x-new-token-expires-in"), value);
        }
    }
    Ok(res)
}

fn short_circuit(req: &ServiceRequest, err: ApiError) -> ServiceResponse<BoxBody> {
    let http_req = req.request().clone();
    let response = HttpResponse::from_error(err).map_into_boxed_body();
    ServiceResponse::new(http_req, response)
}

/// Merges the five `X-Vire-*` headers into the [`TenantContext`] a
/// successful bearer token may already have attached, or creates a fresh
/// one. See [`crate::pipeline`] module docs and spec §4.1 for the exact
/// precedence rule this implements.
pub async fn tenant_header(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let header = |name: &'static str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let h_portfolios = header("x-vire-portfolios");
    let h_currency = header("x-vire-display-currency");
    let h_key = header("x-vire-navexa-key");
    let h_user_id = header("x-vire-user-id");
    let h_service_id = header("x-vire-service-id");

    let had_bearer_context = req.extensions().get::<TenantContext>().is_some();

    if h_portfolios.is_none()
        && h_currency.is_none()
        && h_key.is_none()
        && h_user_id.is_none()
        && h_service_id.is_none()
        && !had_bearer_context
    {
        return Ok(next.call(req).await?.map_into_boxed_body());
    }

    let mut ctx = req.extensions().get::<TenantContext>().cloned().unwrap_or_default();

    // Identity precedence: bearer (already in ctx.user_id) > X-Vire-User-ID.
    if ctx.user_id.is_none() {
        if let Some(uid) = &h_user_id {
            ctx.user_id = Some(uid.clone());
        }
    }

    if let Some(service_id) = &h_service_id {
        let state = req
            .app_data::<web::Data<AppState>>()
            .expect("AppState not configured")
            .clone();
        if let Ok(Some(service_principal)) =
            state.users.find_by_provider_identity("service", service_id).await
        {
            if service_principal.role.as_deref() == Some("service") {
                ctx.role = Some("service".to_string());
                if ctx.user_id.is_none() {
                    ctx.user_id = Some(service_id.clone());
                }
            }
        }
    }

    if let Some(csv) = h_portfolios {
        ctx.portfolios = csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    if let Some(currency) = h_currency {
        ctx.display_currency = Some(currency);
    }
    if let Some(key) = h_key {
        ctx.navexa_key = Some(key);
    }

    req.extensions_mut().insert(ctx);
    Ok(next.call(req).await?.map_into_boxed_body())
}

/// Opaque 8-character request identifier, echoed on every response.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

pub async fn correlation(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let inbound = req
        .headers()
        .get("x-request-id")
        .or_else(|| req.headers().get("x-correlation-id"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let id = inbound.unwrap_or_else(|| {
        let full = Uuid::new_v4().simple().to_string();
        full[..8].to_string()
    });
    req.extensions_mut().insert(CorrelationId(id.clone()));

    let mut res = next.call(req).await?.map_into_boxed_body();
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(HeaderName::from_static("x-correlation-id"), value);
    }
    Ok(res)
}

/// Emits one structured event per request after the handler returns:
/// method, path, raw query, status, byte count, latency, correlation id.
/// Level tracks status: `>=500` error, `>=400` info, else trace.
pub async fn logging(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let method = req.method().to_string();
    let path = req.path().to_string();
    let query = req.query_string().to_string();
    let started = Instant::now();

    let res = next.call(req).await?.map_into_boxed_body();
    let latency_ms = started.elapsed().as_millis();
    let status = res.status().as_u16();
    let bytes = match actix_web::body::MessageBody::size(res.response().body()) {
        actix_web::body::BodySize::Sized(n) => n,
        _ => 0,
    };
    let correlation_id = res
        .request()
        .extensions()
        .get::<CorrelationId>()
        .map(|c| c.0.clone())
        .unwrap_or_default();

    if status >= 500 {
        tracing::error!(%method, %path, %query, status, bytes, latency_ms, %correlation_id, "request");
    } else if status >= 400 {
        tracing::info!(%method, %path, %query, status, bytes, latency_ms, %correlation_id, "request");
    } else {
        tracing::trace!(%method, %path, %query, status, bytes, latency_ms, %correlation_id, "request");
    }

    Ok(res)
}
