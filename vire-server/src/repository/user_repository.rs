//! # User Repository
//!
//! Data access for the `users` table, which stores both interactive
//! principals and service principals (see [`crate::domain::User::is_service`]).
//!
//! ## Query Patterns
//!
//! | Pattern | Example |
//! |---------|---------|
//! | Provider-scoped lookup | `WHERE provider = $1 AND external_id = $2` |
//! | Returning | `INSERT ... RETURNING *` |
//! | Parameterized | Always `$1`, `$2`, never string interpolation |
//!
//! ## Error Handling
//!
//! | sqlx error | `ApiError` |
//! |------------|------------|
//! | `RowNotFound` | `NotFound` |
//! | unique constraint violation | `Conflict` |
//! | other | `Database` (wrapped, 500) |

use sqlx::PgPool;
use uuid::Uuid;
use vire_core::errors::ApiError;

use crate::domain::{NewUser, User};

/// Data access for user rows. `Send + Sync` because `PgPool` is `Arc`-based
/// internally — cheap to clone and share across Actix workers.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::Database)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::Database)
    }

    /// Looks a principal up by its provider-scoped identity, e.g.
    /// `("google", "google_12345")` or `("service", "service:p1")`.
    pub async fn find_by_provider_identity(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE provider = $1 AND external_id = $2")
            .bind(provider)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::Database)
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, role, provider, external_id, password_hash, preferences, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, '{}'::jsonb, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.role)
        .bind(&new_user.provider)
        .bind(&new_user.external_id)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("a user with this identity already exists".into())
            }
            _ => ApiError::Database(e),
        })
    }

    /// Updates `email`/`name` when they have changed; used by the
    /// find-or-create path on repeat logins.
    pub async fn update_profile(
        &self,
        id: Uuid,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = COALESCE($2, email), name = COALESCE($3, name), updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::Database)
    }

    pub async fn update_role(&self, id: Uuid, role: &str) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>("UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => ApiError::NotFound("user not found".into()),
                other => ApiError::Database(other),
            })
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("user not found".into()),
            other => ApiError::Database(other),
        })
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::Database)?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("user not found".into()));
        }
        Ok(())
    }

    /// Availability check for `GET /api/users/check/{name}` — `name` is
    /// matched against `email`.
    pub async fn email_taken(&self, email: &str) -> Result<bool, ApiError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::Database)?;
        Ok(row.is_some())
    }

    /// Create-or-update by provider identity, used by `POST /api/users/upsert`.
    pub async fn upsert(&self, new_user: NewUser) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, role, provider, external_id, password_hash, preferences, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, '{}'::jsonb, now(), now())
            ON CONFLICT (provider, external_id)
            DO UPDATE SET email = EXCLUDED.email, name = EXCLUDED.name, updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.role)
        .bind(&new_user.provider)
        .bind(&new_user.external_id)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::Database)
    }

    /// Purges stale service principals (`POST /api/admin/services/tidy`):
    /// those with `provider = 'service'` not updated within `older_than_days`.
    pub async fn tidy_stale_service_principals(&self, older_than_days: i32) -> Result<u64, ApiError> {
        let result = sqlx::query(
            "DELETE FROM users WHERE provider = 'service' AND updated_at < now() - ($1 || ' days')::interval",
        )
        .bind(older_than_days.to_string())
        .execute(&self.pool)
        .await
        .map_err(ApiError::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn list_all(&self) -> Result<Vec<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::Database)
    }
}
