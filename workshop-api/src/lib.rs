//! # Workshop Admin API Server Library
//!
//! HTTP layer for the repair-shop administration backend: account lifecycle
//! and audit trail endpoints on top of `workshop-shared`.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers
//! - `session`: Session and actor extraction

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
pub mod session;
