//! # vire-core
//!
//! Framework-agnostic building blocks shared by vire's HTTP services: the
//! signed-token subsystem, the error taxonomy, configuration loading, the
//! Postgres pool, the Redis client, tracing setup, and request validation
//! helpers.
//!
//! ## Modules
//!
//! | Module | Purpose | Key Types |
//! |--------|---------|-----------|
//! | [`config`] | Environment-based configuration | [`AppConfig`] |
//! | [`errors`] | Standardized error handling | [`ApiError`], [`ApiResult`] |
//! | [`token`] | Session token minting/validation | [`SessionTokenClaims`], [`TokenService`] |
//! | [`oauth_state`] | Signed OAuth redirect correlator | [`StateBlobService`] |
//! | [`auth`] | Password hashing | [`PasswordHasher`] |
//! | [`database`] | PostgreSQL connection pool | [`create_pool`](database::create_pool) |
//! | [`redis_client`] | Redis for counters & job queue state | [`RedisClient`] |
//! | [`tracing_config`] | Structured logging setup | [`init_tracing`](tracing_config::init_tracing) |
//! | [`validation`] | Request validation, ticker format, secret masking | Custom validators |
//! | [`respond`] | JSON envelope + body decode helpers | [`write_json`], [`decode_json`] |
//!
//! This crate does not know about `actix-web` routing; it is deliberately
//! usable from a CLI, a batch job, or a second HTTP binary without pulling in
//! the request pipeline.

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod oauth_state;
pub mod redis_client;
pub mod respond;
pub mod token;
pub mod tracing_config;
pub mod validation;

pub use config::AppConfig;
pub use errors::{ApiError, ApiResult};
pub use token::{SessionTokenClaims, TokenService};
