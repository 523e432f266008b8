//! Session domain model.
//!
//! A session record is the server-side truth a session token must be
//! corroborated against; deleting the record revokes the token. A user
//! may hold any number of concurrent sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
