//! Case tracking HTTP API backed by Google Cloud Firestore.
//!
//! Cases are tickets with a title, an affected system, a priority and a
//! status. The service creates them with `Open` status and a `Low` default
//! priority, lists them all, and merges partial updates into existing ones.
//!
//! ```text
//! POST /cases        {"title":"Disk full","systemName":"db1"}
//!   -> 201 {"id":"...","priority":"Low","status":"Open","createdAt":"..."}
//! GET  /cases        -> 200 [{"id":"...", ..., "createdAt":"2025-01-02T03:04:05.000Z"}]
//! PUT  /cases/{id}   {"status":"Resolved"}
//!   -> 200 {"message":"Case updated successfully"}
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`credentials`]: Service-account key loading and access tokens
//! - [`store`]: Document store trait, Firestore client, in-memory store
//! - [`cases`]: Case records, defaults, and rendering
//! - [`api`]: HTTP routes and handlers
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod cases;
pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{Result, ServerError};
