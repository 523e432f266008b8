//! Keygate Core — domain models, the credential store and mail
//! dispatcher contracts, and the shared error taxonomy.
//!
//! This crate contains no I/O. The auth engine depends only on the
//! traits defined here; backends live in `keygate-db` and
//! `keygate-mail`.

pub mod error;
pub mod mail;
pub mod models;
pub mod store;

pub use error::{KeygateError, KeygateResult};
pub use mail::{Mail, MailDispatcher};
pub use store::CredentialStore;
