//! # Vire Server
//!
//! The authentication, identity-resolution, and request-dispatch backbone
//! shared by every downstream Vire service. It issues and validates session
//! tokens, brokers Google/GitHub/dev OAuth, resolves a [`Principal`] and
//! [`TenantContext`] from each inbound request, and fronts a small set of
//! its own endpoints (user CRUD, password auth, service-principal
//! registration) alongside the hierarchical portfolio/admin/internal-oauth
//! mux.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Request Pipeline (pipeline/)                  │
//! │   Recovery → CORS → BearerToken → TenantHeader → Correlation →  │
//! │   Logging → handler                                              │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                ┌──────────────┴──────────────┐
//!                ▼                             ▼
//! ┌───────────────────────────┐   ┌─────────────────────────────────┐
//! │  Flat routes (api/)       │   │  Hierarchical mux (mux/)        │
//! │  users, auth, oauth,      │   │  portfolios, admin/jobs,         │
//! │  services, admin, mcp     │   │  admin/users/{id}/role,          │
//! │                           │   │  internal/oauth                 │
//! └─────────────┬─────────────┘   └─────────────────┬───────────────┘
//!               ▼                                   ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Service Layer (service/)                     │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Repository Layer (repository/)                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//!
//! Environment variables are loaded via [`vire_core::config::AppConfig`].
//! Key settings:
//!
//! - `SERVICE_NAME` — defaults to `vire-server`
//! - `JWT_SECRET` — session-token signing key (32+ bytes)
//! - `SERVICE_REGISTRATION_KEY` — shared key gating `/api/services/register`
//! - `PUBLIC_BASE_URL` — origin used to build OAuth `redirect_uri` values
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`, `GITHUB_CLIENT_ID` /
//!   `GITHUB_CLIENT_SECRET` — OAuth provider credentials; either pair may be
//!   left unset, in which case that provider 502s as `provider_not_configured`

use actix_web::{middleware, web, App, HttpServer};
use tracing::info;
use vire_core::{config::AppConfig, database, oauth_state::StateBlobService, redis_client::RedisClient, token::TokenService, tracing_config};

mod api;
mod domain;
mod mux;
mod oauth;
mod pipeline;
mod repository;
mod service;
mod state;

use oauth::ProviderRegistry;
use repository::{OAuthRepository, UserRepository};
use state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::from_env().expect("failed to load configuration");

    tracing_config::init_tracing(&config.service_name, config.is_production());

    info!(
        service = %config.service_name,
        host = %config.server.host,
        port = %config.server.port,
        environment = ?config.environment,
        "starting vire-server"
    );

    let db_pool = database::create_pool(&config.database)
        .await
        .expect("failed to create database pool");

    let redis = RedisClient::new(&config.redis)
        .await
        .expect("failed to connect to redis");

    let tokens = TokenService::new(config.token.secret.clone(), config.token.ttl_seconds);
    // Distinct HMAC scope from session tokens so a leaked state blob can't
    // be replayed as a session token or vice versa.
    let state_blobs = StateBlobService::new(format!("{}:oauth-state", config.token.secret));
    let hasher = vire_core::auth::PasswordHasher::new();
    let users = UserRepository::new(db_pool.clone());
    let oauth_store = OAuthRepository::new(db_pool.clone());
    let providers = ProviderRegistry::new(&config.oauth, config.is_production());
    let http = reqwest::Client::new();

    let app_state = web::Data::new(AppState {
        config: config.clone(),
        db: db_pool,
        redis,
        tokens,
        state_blobs,
        hasher,
        users,
        oauth_store,
        providers,
        http,
    });

    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let workers = config.server.workers;

    info!("server listening on {}:{}", server_host, server_port);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            // Reverse of the data-flow order documented in `pipeline` — the
            // last `.wrap()` call here ends up outermost.
            .wrap(middleware::from_fn(pipeline::logging))
            .wrap(middleware::from_fn(pipeline::correlation))
            .wrap(middleware::from_fn(pipeline::tenant_header))
            .wrap(middleware::from_fn(pipeline::bearer_token))
            .wrap(pipeline::cors())
            .wrap(middleware::from_fn(pipeline::recovery))
            .configure(api::routes::configure)
            .route("/api/portfolios/{tail:.*}", web::route().to(mux::portfolios))
            .route("/api/admin/jobs/{tail:.*}", web::route().to(mux::admin_jobs))
            .route("/api/admin/users/{tail:.*}/role", web::route().to(mux::admin_user_role))
            .route("/api/internal/oauth/{tail:.*}", web::route().to(mux::internal_oauth))
            .route("/api/feedback", web::route().to(mux::feedback))
            .route("/api/feedback/{tail:.*}", web::route().to(mux::feedback))
    });

    if workers > 0 {
        server = server.workers(workers);
    }

    server.bind((server_host, server_port))?.run().await
}
