//! # Shared Application State
//!
//! Everything a handler or pipeline middleware needs, injected once at
//! startup via [`actix_web::web::Data`] and cloned (cheaply — every field is
//! either `Arc`-backed or itself a pool) into each worker.

use sqlx::PgPool;
use vire_core::{
    auth::PasswordHasher, config::AppConfig, oauth_state::StateBlobService, redis_client::RedisClient,
    token::TokenService,
};

use crate::oauth::ProviderRegistry;
use crate::repository::{OAuthRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: PgPool,
    pub redis: RedisClient,
    pub tokens: TokenService,
    pub state_blobs: StateBlobService,
    pub hasher: PasswordHasher,
    pub users: UserRepository,
    pub oauth_store: OAuthRepository,
    pub providers: ProviderRegistry,
    pub http: reqwest::Client,
}
