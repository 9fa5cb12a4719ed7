//! # Service Layer
//!
//! Sits between the API handlers and the repository layer: password login,
//! admin-style password reset, and service-principal registration. OAuth's
//! own business logic (find-or-create, the four-state broker) lives next to
//! its handlers in [`crate::oauth`] rather than here, since it shares
//! almost nothing with password auth beyond the user repository.
//!
//! | Operation           | Validation                    | Side effects              |
//! |----------------------|-------------------------------|---------------------------|
//! | `login`              | Credential verification       | Mints a session token     |
//! | `reset_password`     | New-password strength          | Overwrites password hash  |
//! | `register_service`   | Shared registration key (caller)| Upserts a service principal |

pub mod auth_service;

pub use auth_service::AuthService;
