//! # Request Validation Helpers
//!
//! Utilities for validating incoming request data using the `validator` crate.
//!
//! ## Overview
//!
//! This module provides:
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`validate_request`] | Validate a struct implementing `Validate` |
//! | [`parse_and_validate`] | Parse JSON and validate in one step |
//!
//! ## How Validation Works
//!
//! We use the [`validator`](https://docs.rs/validator/) crate which provides
//! derive macros for declarative validation:
//!
//! ```rust,ignore
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct CreateUser {
//!     #[validate(email)]
//!     email: String,
//!
//!     #[validate(length(min = 10))]
//!     password: String,
//! }
//! ```
//!
//! ## Validation Flow
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────┐
//! │ JSON Request │────►│ Deserialize   │────►│   Validate   │
//! │              │     │ (serde)       │     │  (validator) │
//! └──────────────┘     └───────────────┘     └──────┬───────┘
//!                                                   │
//!         ┌─────────────────────────────────────────┴───────┐
//!         │                                                 │
//!         ▼                                                 ▼
//! ┌───────────────┐                               ┌─────────────────┐
//! │   Success     │                               │ ValidationError │
//! │ (continue)    │                               │   (400 + details)│
//! └───────────────┘                               └─────────────────┘
//! ```
//!
//! ## Error Response Format
//!
//! When validation fails, the API returns a 400 Bad Request with details:
//!
//! ```json
//! {
//!   "code": "VALIDATION_ERROR",
//!   "message": "Validation error",
//!   "details": {
//!     "email": [
//!       { "code": "email", "message": "Invalid email format" }
//!     ],
//!     "password": [
//!       { "code": "length", "message": "Must be at least 10 characters" }
//!     ]
//!   }
//! }
//! ```
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use vire_core::validation::validate_request;
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct CreateUser {
//!     #[validate(email)]
//!     email: String,
//! }
//!
//! async fn handler(body: Json<CreateUser>) -> Result<impl Responder, ApiError> {
//!     validate_request(&body)?;
//!     // Validation passed, continue...
//! }
//! ```
//!
//! ## Related Documentation
//!
//! - [`validator` crate](https://docs.rs/validator/)
//! - [`crate::errors::ApiError`] - Error handling
//!
//! This module also carries two handler-facing helpers that are not
//! `validator`-derive based: [`validate_ticker`] (the stock-ticker format
//! gate used across the portfolio/market-data handlers) and [`mask_secret`]
//! (the only permitted way to put a downstream API key into a response or
//! log line).

use crate::errors::ApiError;
use serde::de::DeserializeOwned;
use validator::Validate;

// =============================================================================
// Core Validation Functions
// =============================================================================

/// Validates a request DTO that implements `Validate`.
///
/// This is the primary validation function. Use it in handlers to
/// validate incoming data.
///
/// ## Example
///
/// ```rust,ignore
/// async fn create_user(body: Json<CreateUserDto>) -> Result<impl Responder, ApiError> {
///     validate_request(&body)?;  // Returns early if invalid
///     
///     // Continue with validated data
/// }
/// ```
///
/// ## Errors
///
/// Returns `ApiError::ValidationError` with field-level details if validation fails.
pub fn validate_request<T: Validate>(data: &T) -> Result<(), ApiError> {
    data.validate().map_err(ApiError::Validation)
}

/// Parses JSON string and validates in a single step.
///
/// Useful when you have raw JSON and need to parse + validate.
///
/// ## Example
///
/// ```rust,ignore
/// let json = r#"{"email": "user@example.com", "password": "secret"}"#;
/// let user: CreateUserDto = parse_and_validate(json)?;
/// ```
///
/// ## Errors
///
/// - `ApiError::BadRequest` if JSON parsing fails
/// - `ApiError::ValidationError` if validation fails
pub fn parse_and_validate<T: DeserializeOwned + Validate>(json: &str) -> Result<T, ApiError> {
    // Parse JSON
    let data: T = serde_json::from_str(json)
        .map_err(|e| ApiError::BadInput(format!("Invalid JSON: {e}")))?;

    // Validate
    validate_request(&data)?;

    Ok(data)
}

// =============================================================================
// Ticker Format
// =============================================================================

/// Validates and normalizes a stock ticker of the form `BASE.EXCHANGE`
/// (e.g. `BHP.AU`). The input is trimmed and uppercased first; the result
/// must contain exactly one `.` separating a non-empty base from a
/// non-empty exchange suffix, and every character of the base must be in
/// `[A-Za-z0-9_-]`.
///
/// ## Examples
///
/// - `"bhp.au"` -> `Ok("BHP.AU".to_string())`
/// - `"BHP"` -> rejected (no exchange suffix)
/// - `"../../../etc/passwd.AU"` -> rejected (`/` is not in the allowed set)
pub fn validate_ticker(input: &str) -> Result<String, ApiError> {
    let normalized = input.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(invalid_ticker());
    }

    let mut segments = normalized.splitn(2, '.');
    let base = segments.next().unwrap_or("");
    let exchange = segments.next();

    let exchange = match exchange {
        Some(e) if !e.is_empty() && !e.contains('.') => e,
        _ => return Err(invalid_ticker()),
    };

    if base.is_empty()
        || !base.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid_ticker());
    }

    Ok(format!("{base}.{exchange}"))
}

fn invalid_ticker() -> ApiError {
    ApiError::BadInput(
        "ticker must look like BASE.EXCHANGE, e.g. BHP.AU, AAPL.US, VAS.FOREX".to_string(),
    )
}

// =============================================================================
// Secret Masking
// =============================================================================

/// Masks a sensitive string for display: values of at least 8 characters
/// keep their first and last 4 characters with `****` in between; anything
/// shorter becomes exactly `****` regardless of content, since a 4-and-4
/// split on a short value would overlap and leak the whole thing back out.
pub fn mask_secret(value: &str) -> String {
    let len = value.chars().count();
    if len < 8 {
        return "****".to_string();
    }

    let chars: Vec<char> = value.chars().collect();
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[len - 4..].iter().collect();
    format!("{head}****{tail}")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    #[test]
    fn ticker_accepts_base_dot_exchange() {
        assert_eq!(super::validate_ticker("bhp.au").unwrap(), "BHP.AU");
    }

    #[test]
    fn ticker_rejects_missing_exchange() {
        assert!(super::validate_ticker("BHP").is_err());
    }

    #[test]
    fn ticker_rejects_path_traversal() {
        assert!(super::validate_ticker("../../../etc/passwd.AU").is_err());
    }

    #[test]
    fn mask_secret_keeps_head_and_tail() {
        assert_eq!(super::mask_secret("sk_live_abcdef1234"), "sk_l****1234");
    }

    #[test]
    fn mask_secret_short_values_become_stars() {
        assert_eq!(super::mask_secret("abcd"), "****");
        assert_eq!(super::mask_secret("ab"), "****");
    }

    #[test]
    fn mask_secret_mid_length_values_dont_leak_through_overlap() {
        // A naive first-4/last-4 split overlaps below 8 chars and reconstructs
        // the whole secret in the "masked" output.
        assert_eq!(super::mask_secret("abcde"), "****");
        assert_eq!(super::mask_secret("abcdefg"), "****");
    }
}

