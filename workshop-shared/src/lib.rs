//! # Workshop Shared Library
//!
//! Domain types and business logic for the repair-shop administration
//! backend: user accounts, their guardrails, and the append-only audit trail.
//!
//! ## Module Organization
//!
//! - `accounts`: Account lifecycle operations (create, update, deactivate, ...)
//! - `audit`: Best-effort audit logger and audit trail queries
//! - `auth`: Password hashing, JWT, permission slugs, acting identity
//! - `db`: PostgreSQL pool and migrations
//! - `error`: Error type surfaced by account operations
//! - `models`: User and audit record models with their SQL
//! - `pagination`: Page/limit resolution shared by list endpoints
//! - `store`: Storage traits with PostgreSQL and in-memory backends

pub mod accounts;
pub mod audit;
pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod store;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
