//! # Redis Client for Counters and Job-Queue State
//!
//! High-level Redis client used for two ambient concerns the core otherwise
//! stays silent about: counting failed logins (observability only — the
//! Non-goals explicitly exclude enforcing a hard rate limit) and reporting
//! whether the background job manager backing `/api/admin/jobs/...` is
//! reachable.
//!
//! Session tokens are **not** tracked here. The core does not implement a
//! revocation list beyond the OAuth store's own expiry sweep (see
//! `crate::token`), so there is no blacklist to maintain.
//!
//! ## Connection Management
//!
//! We use a `ConnectionManager` which automatically reconnects on failure —
//! more resilient than a bare connection for a long-running service.
//!
//! ## Key Naming Convention
//!
//! | Pattern | Example | Purpose |
//! |---------|---------|---------|
//! | `failed_login:{identifier}` | `failed_login:user@example.com` | Login-attempt counter |
//! | `jobqueue:*` | `jobqueue:heartbeat` | Background job manager liveness |
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use vire_core::redis_client::RedisClient;
//!
//! let redis = RedisClient::new(&config.redis).await?;
//! redis.set("key", &"value", Some(Duration::from_secs(3600))).await?;
//! let value: Option<String> = redis.get("key").await?;
//! ```

use crate::config::RedisConfig;
use crate::errors::ApiError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

/// Async Redis client with automatic reconnection. Cheap to clone (wraps a
/// `ConnectionManager`, itself cheap to clone) and safe to share across
/// tasks.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Creates a new Redis client and establishes connection.
    pub async fn new(config: &RedisConfig) -> Result<Self, ApiError> {
        info!(url = %config.url, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str()).map_err(ApiError::Redis)?;
        let conn = ConnectionManager::new(client).await.map_err(ApiError::Redis)?;

        info!("Redis connection established");
        Ok(Self { conn })
    }

    /// Stores a JSON-serialized value with an optional TTL.
    pub async fn set<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), ApiError> {
        let serialized = serde_json::to_string(value)
            .map_err(|e| ApiError::Internal(format!("redis serialize failed: {e}")))?;

        let mut conn = self.conn.clone();
        match ttl {
            Some(duration) => {
                conn.set_ex::<_, _, ()>(key, &serialized, duration.as_secs())
                    .await
                    .map_err(ApiError::Redis)?;
            }
            None => {
                conn.set::<_, _, ()>(key, &serialized).await.map_err(ApiError::Redis)?;
            }
        }
        Ok(())
    }

    /// Retrieves and deserializes a value; `Ok(None)` when the key is absent.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApiError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(ApiError::Redis)?;
        match value {
            Some(s) => {
                let deserialized = serde_json::from_str(&s)
                    .map_err(|e| ApiError::Internal(format!("redis deserialize failed: {e}")))?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await.map_err(ApiError::Redis)?;
        Ok(deleted > 0)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(ApiError::Redis)
    }

    /// Increments a counter, creating it at 1 if absent.
    pub async fn incr(&self, key: &str) -> Result<i64, ApiError> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1).await.map_err(ApiError::Redis)
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl.as_secs() as i64).await.map_err(ApiError::Redis)
    }

    /// Health check used by `/api/health` and the job-manager availability
    /// gate on `/api/admin/jobs/...`.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await.map_err(ApiError::Redis)?;
        Ok(())
    }

    // =========================================================================
    // Login-attempt counters (observability only; no lockout is enforced)
    // =========================================================================

    /// Increments the failed-login counter for an identifier (typically an
    /// email), setting a 15-minute expiry on the first attempt so the
    /// counter self-resets. The return value is for logging/metrics; the
    /// core does not itself refuse a login because of it.
    pub async fn increment_failed_login(&self, identifier: &str) -> Result<i64, ApiError> {
        let key = format!("failed_login:{identifier}");
        let count = self.incr(&key).await?;
        if count == 1 {
            self.expire(&key, Duration::from_secs(15 * 60)).await?;
        }
        Ok(count)
    }

    pub async fn reset_failed_login(&self, identifier: &str) -> Result<(), ApiError> {
        let key = format!("failed_login:{identifier}");
        self.delete(&key).await?;
        Ok(())
    }

    // =========================================================================
    // Background job manager liveness
    // =========================================================================

    /// Whether the job-queue backing `/api/admin/jobs/...` is reachable.
    /// A `false` here is what turns into [`ApiError::Unavailable`] at the
    /// handler boundary rather than propagating a raw Redis error.
    pub async fn job_queue_healthy(&self) -> bool {
        self.ping().await.is_ok()
    }
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient").finish_non_exhaustive()
    }
}
