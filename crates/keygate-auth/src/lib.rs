//! Keygate Auth — the credential/session lifecycle engine: signup and
//! confirmation, stateful signin sessions, password reset, and
//! admin-gated account management, multi-tenant by `app_id`.

pub mod admin;
pub mod config;
pub mod mail;
pub mod password;
pub mod service;
pub mod sweeper;
pub mod token;

pub use admin::AdminGate;
pub use config::{AuthConfig, MailTemplate};
pub use service::AuthService;
pub use sweeper::MaintenanceSweeper;
