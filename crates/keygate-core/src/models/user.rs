//! User domain model.
//!
//! A user is uniquely identified by `(app_id, email)` and owns one
//! stable `id` that survives email changes. The confirmation key is
//! present only while the account is unconfirmed; the reset key only
//! between a reset request and its consumption or expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub app_id: String,
    pub email: String,
    /// Argon2id PHC-format hash.
    pub hashed_pass: String,
    pub lang: String,
    pub created_at: DateTime<Utc>,
    pub confirmation_key: Option<String>,
    /// Set at most once, never cleared.
    pub confirmed_at: Option<DateTime<Utc>>,
    pub reset_key: Option<String>,
    pub reset_key_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }
}

/// Input for user creation.
///
/// The password is hashed by the engine before it reaches the store;
/// raw passwords never cross the store boundary.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub app_id: String,
    pub email: String,
    pub hashed_pass: String,
    pub lang: String,
    /// `None` for admin-created accounts, which skip confirmation.
    pub confirmation_key: Option<String>,
    /// When true the store sets `confirmed_at = created_at`.
    pub confirmed: bool,
}

/// Admin-facing listing row. Never exposes hashes or keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub app_id: String,
    pub email: String,
    pub lang: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}
