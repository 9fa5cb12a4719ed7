//! # Password Hashing
//!
//! Session authentication itself lives in [`crate::token`] (signed session
//! tokens) and [`crate::oauth_state`] (signed OAuth redirect state); this
//! module covers the one place a password still appears — hashing the
//! bootstrap credential created by `POST /api/users` — using Argon2id.
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`PasswordHasher`] | Argon2id password hashing for bootstrap accounts |
//! | [`PasswordValidator`] | Minimum password strength checks |

pub mod password;

pub use password::{PasswordHasher, PasswordValidator};
