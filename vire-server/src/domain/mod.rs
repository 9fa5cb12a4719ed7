//! # Domain Layer
//!
//! Framework-agnostic entities backing the identity/OAuth subsystem: users
//! (including service principals), refresh tokens, authorization codes, and
//! in-flight OAuth sessions. See [`entities`] for the entity-to-table map.

pub mod entities;

pub use entities::*;
