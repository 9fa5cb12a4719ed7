//! # Data Transfer Objects (DTOs)
//!
//! Request bodies for the handlers in [`super::handlers`]. Responses are
//! written straight through [`vire_core::respond::write_json`] around
//! domain types ([`crate::domain::User`]) or ad hoc `serde_json::json!`
//! values — there's no separate response-DTO layer, since nothing here
//! needs a shape different from its stored representation.
//!
//! ## Validation
//!
//! Fields get the `validator` derive where a rule from spec's boundary
//! behaviors applies (email shape, non-empty strings); anything checked by
//! a domain type's own constructor (ticker format, password strength) is
//! left to that type rather than duplicated here.

use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertUserRequest {
    #[validate(email)]
    pub email: String,
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterServiceRequest {
    #[validate(length(min = 1))]
    pub service_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1))]
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct TidyServicesRequest {
    /// Service principals untouched for longer than this are purged.
    /// Defaults to 30 in the handler when absent.
    pub older_than_days: Option<i32>,
}
