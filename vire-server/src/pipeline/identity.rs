//! # Principal and TenantContext
//!
//! The two request-scoped types every downstream handler reads instead of
//! reaching back into the pipeline. Both are immutable once the pipeline
//! finishes (§5 ordering guarantee) and both are destroyed with the request
//! — they are stored in `HttpRequest` extensions, never in any store.

use serde::Serialize;
use uuid::Uuid;

/// The authenticated caller, resolved from a bearer token. Absent when the
/// request carries no (valid) `Authorization: Bearer …` header — the
/// pipeline does not fail closed on a missing bearer token, only on an
/// invalid one.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    /// `email`, `dev`, `google`, `github`, or `service`.
    pub provider: String,
}

/// Per-request tenant configuration bundle. Built by the Identity Resolver
/// (bearer-token lookup merged with `X-Vire-*` headers) and attached once;
/// its absence means single-tenant fallback to process-level configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TenantContext {
    /// Audit identity — "who did this". Distinct from `role`, which a
    /// service-header override can change without touching this field.
    pub user_id: Option<String>,
    /// Authorization role — "may this succeed".
    pub role: Option<String>,
    pub portfolios: Vec<String>,
    pub display_currency: Option<String>,
    /// The downstream third-party API credential. Never serialize this
    /// verbatim in a response or log line — use [`mask_secret`] first.
    #[serde(skip_serializing)]
    pub navexa_key: Option<String>,
}

impl TenantContext {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.role.is_none()
            && self.portfolios.is_empty()
            && self.display_currency.is_none()
            && self.navexa_key.is_none()
    }
}

pub use vire_core::validation::mask_secret;
