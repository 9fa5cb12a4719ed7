//! # API Layer
//!
//! Flat, directly-routed endpoints: user CRUD, password auth, service
//! registration, admin listing, and the MCP tool catalog.
//!
//! | Module       | Responsibility                                      |
//! |--------------|------------------------------------------------------|
//! | `routes`     | Route registration via `ServiceConfig`              |
//! | `handlers`   | Request handlers (extractors → service → response)  |
//! | `dto`        | Request bodies                                      |
//!
//! The OAuth broker's own routes and the hierarchical mux live in
//! [`crate::oauth`] and [`crate::mux`] respectively — neither maps onto a
//! single static path the way the endpoints here do.

pub mod dto;
pub mod handlers;
pub mod routes;
