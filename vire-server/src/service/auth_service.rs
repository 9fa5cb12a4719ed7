//! # Authentication Service
//!
//! Core business logic that sits behind the handful of non-OAuth `/api/auth`
//! and `/api/services` endpoints: password login, the admin-style password
//! reset, and service-principal registration. The OAuth find-or-create path
//! lives with the broker in [`crate::oauth::handlers`] since it shares no
//! state with password auth beyond the user repository and token service.

use vire_core::auth::{PasswordHasher, PasswordValidator};
use vire_core::errors::ApiError;
use vire_core::token::{NewSessionToken, TokenService};

use crate::domain::User;
use crate::repository::UserRepository;

#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    tokens: TokenService,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(users: UserRepository, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self { users, tokens, hasher }
    }

    /// `POST /api/auth/login`. Anti-enumeration: an unknown email and a
    /// known email with the wrong password both return the byte-identical
    /// `ApiError::invalid_credentials()` body.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, User), ApiError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(ApiError::invalid_credentials)?;

        if user.is_service() {
            return Err(ApiError::Forbidden("service principals cannot log in interactively".into()));
        }

        let hash = user.password_hash.as_deref().ok_or_else(ApiError::invalid_credentials)?;
        if !self.hasher.verify(password, hash)? {
            return Err(ApiError::invalid_credentials());
        }

        let token = self.tokens.mint(NewSessionToken {
            subject: &user.id.to_string(),
            email: user.email.as_deref(),
            name: user.name.as_deref(),
            role: user.role.as_deref(),
            provider: "email",
            client_id: None,
            scope: None,
        })?;

        Ok((token, user))
    }

    /// `POST /api/auth/password-reset`. Admin-style: sets a new password
    /// directly given the account's email, no verification-token round
    /// trip. Anti-enumeration does not apply here — the endpoint needs to
    /// tell the caller whether the account exists to be usable at all.
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<User, ApiError> {
        PasswordValidator::validate(new_password).map_err(|errors| ApiError::BadInput(errors.join(", ")))?;

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("no account for {email}")))?;

        let hash = self.hasher.hash(new_password)?;
        self.users.update_password(user.id, &hash).await
    }

    /// `POST /api/services/register`. Idempotent per the provider-identity
    /// upsert: a second call for the same `service_id` returns the original
    /// `created_at`, though `updated_at` may advance.
    pub async fn register_service(&self, service_id: &str) -> Result<User, ApiError> {
        self.users
            .upsert(crate::domain::NewUser {
                email: None,
                name: None,
                role: Some("service".to_string()),
                provider: "service".to_string(),
                external_id: format!("service:{service_id}"),
                password_hash: None,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_reset_password_is_rejected_before_hashing() {
        let errors = PasswordValidator::validate("short").unwrap_err();
        assert!(!errors.is_empty());
    }
}
