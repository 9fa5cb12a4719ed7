//! # Repository Layer
//!
//! Data access for the identity subsystem's two stores: the user store
//! ([`UserRepository`], table `users`) and the OAuth store
//! ([`OAuthRepository`], tables `refresh_tokens`, `authorization_codes`,
//! `oauth_sessions`). Both hold a cloned `PgPool` (cheap — `Arc` internally)
//! and map `sqlx::Error` to [`vire_core::errors::ApiError`].

pub mod oauth_repository;
pub mod user_repository;

pub use oauth_repository::OAuthRepository;
pub use user_repository::UserRepository;
