//! Credential store contract.
//!
//! The engine relies on the store for all ordering guarantees: the
//! `(app_id, email)` uniqueness constraint must hold atomically across
//! concurrent `create_user` calls, and every `set_*` method must be a
//! single-row atomic update. "Not found" is always reported as
//! [`crate::KeygateError::NotFound`], distinguishable from transport
//! errors.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::KeygateResult;
use crate::models::{NewUser, Session, User, UserView};

pub trait CredentialStore: Send + Sync {
    /// Persist a new user. Fails with `Conflict` if `(app_id, email)`
    /// is already taken; exactly one of two concurrent calls for the
    /// same pair may succeed.
    fn create_user(&self, input: NewUser) -> impl Future<Output = KeygateResult<User>> + Send;

    fn get_user_by_email(
        &self,
        app_id: &str,
        email: &str,
    ) -> impl Future<Output = KeygateResult<User>> + Send;

    fn get_user_by_id(&self, id: Uuid) -> impl Future<Output = KeygateResult<User>> + Send;

    /// Mark the user confirmed and clear the confirmation key in the
    /// same row update.
    fn set_confirmed_at(
        &self,
        id: Uuid,
        confirmed_at: DateTime<Utc>,
    ) -> impl Future<Output = KeygateResult<()>> + Send;

    /// Store a fresh reset key with its request timestamp, overwriting
    /// any outstanding one — at most one reset is in flight per user.
    fn set_reset_key(
        &self,
        id: Uuid,
        reset_key: &str,
        requested_at: DateTime<Utc>,
    ) -> impl Future<Output = KeygateResult<()>> + Send;

    fn clear_reset_key(&self, id: Uuid) -> impl Future<Output = KeygateResult<()>> + Send;

    /// Replace the password hash and clear the reset key in the same
    /// row update, so two concurrent resets cannot both succeed.
    fn set_hashed_pass(
        &self,
        id: Uuid,
        hashed_pass: &str,
    ) -> impl Future<Output = KeygateResult<()>> + Send;

    /// Fails with `Conflict` if the new email collides with another
    /// account in the same app.
    fn set_email(&self, id: Uuid, email: &str) -> impl Future<Output = KeygateResult<()>> + Send;

    /// Remove the users and every session they own, as one atomic
    /// operation — a crash in the middle must not leave orphaned
    /// sessions.
    fn remove_users(&self, ids: &[Uuid]) -> impl Future<Output = KeygateResult<()>> + Send;

    /// List users, optionally restricted to one app.
    fn list_users(
        &self,
        app_id: Option<&str>,
    ) -> impl Future<Output = KeygateResult<Vec<UserView>>> + Send;

    fn create_session(&self, user_id: Uuid) -> impl Future<Output = KeygateResult<Session>> + Send;

    fn get_session(&self, id: Uuid) -> impl Future<Output = KeygateResult<Session>> + Send;

    /// Removing an absent session is not an error.
    fn remove_session(&self, id: Uuid) -> impl Future<Output = KeygateResult<()>> + Send;

    fn remove_sessions_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = KeygateResult<()>> + Send;

    /// Delete unconfirmed users created before `cutoff`; returns the
    /// number of rows removed.
    fn purge_unconfirmed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = KeygateResult<u64>> + Send;

    /// Delete sessions whose last activity predates `cutoff`; returns
    /// the number of rows removed.
    fn purge_idle_sessions_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = KeygateResult<u64>> + Send;
}
