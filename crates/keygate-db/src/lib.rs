//! Keygate DB — SurrealDB connection management, schema migrations,
//! and the [`keygate_core::CredentialStore`] implementation.
//!
//! The in-memory engine (`kv-mem`) backs the test suites; the
//! WebSocket engine backs deployments.

mod connection;
mod error;
mod schema;
mod store;

pub use connection::{DbConfig, DbManager};
pub use error::StoreError;
pub use schema::run_migrations;
pub use store::SurrealCredentialStore;
