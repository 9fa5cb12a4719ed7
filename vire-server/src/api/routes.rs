//! # Route Configuration
//!
//! Flat routes only — the hierarchical `/api/portfolios/...`,
//! `/api/admin/jobs/...`, `/api/admin/users/{id}/role`, and
//! `/api/internal/oauth/...` prefixes are registered separately in
//! [`crate::mux`] and [`crate::main`], since they parse their own path
//! tail instead of relying on actix-web's pattern matcher.

use actix_web::web;

use crate::oauth;

use super::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Operational
        .route("/api/health", web::get().to(handlers::health_check))
        .route("/api/version", web::get().to(handlers::version))
        .route("/api/config", web::get().to(handlers::config))
        .route("/api/diagnostics", web::get().to(handlers::diagnostics))
        // Users
        .route("/api/users", web::post().to(handlers::create_user))
        .route("/api/users/upsert", web::post().to(handlers::upsert_user))
        .route("/api/users/check/{name}", web::get().to(handlers::check_user_availability))
        .route("/api/users/{id}", web::get().to(handlers::get_user))
        .route("/api/users/{id}", web::put().to(handlers::update_user))
        .route("/api/users/{id}", web::delete().to(handlers::delete_user))
        // Password auth
        .route("/api/auth/login", web::post().to(handlers::login))
        .route("/api/auth/validate", web::post().to(handlers::validate))
        .route("/api/auth/password-reset", web::post().to(handlers::password_reset))
        // OAuth broker
        .route("/api/auth/oauth", web::post().to(oauth::handlers::exchange))
        .route("/api/auth/login/{provider}", web::get().to(oauth::handlers::login))
        .route("/api/auth/callback/{provider}", web::get().to(oauth::handlers::callback))
        // Service principals
        .route("/api/services/register", web::post().to(handlers::register_service))
        .route("/api/admin/services/tidy", web::post().to(handlers::tidy_services))
        // Admin
        .route("/api/admin/users", web::get().to(handlers::list_users))
        // Tool catalog
        .route("/api/mcp/tools", web::get().to(handlers::mcp_tools));
}
