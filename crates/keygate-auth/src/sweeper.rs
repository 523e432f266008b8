//! Maintenance sweeper — purges unconfirmed accounts and idle
//! sessions past their configured ages.
//!
//! Both purges are admin-gated, idempotent, and safe to run on any
//! schedule. They report a row count or an error, never per-row
//! detail.

use chrono::{DateTime, Utc};
use tracing::info;

use keygate_core::{CredentialStore, KeygateResult};

use crate::admin::AdminGate;
use crate::config::AuthConfig;

pub struct MaintenanceSweeper<S: CredentialStore> {
    store: S,
    gate: AdminGate,
    cfg: AuthConfig,
}

impl<S: CredentialStore> MaintenanceSweeper<S> {
    pub fn new(store: S, cfg: AuthConfig) -> Self {
        let gate = AdminGate::new(cfg.admin_key.clone());
        Self { store, gate, cfg }
    }

    /// Purge unconfirmed accounts older than the configured age.
    pub async fn remove_unconfirmed_users(&self, admin_key: &str) -> KeygateResult<u64> {
        let cutoff = Utc::now() - self.cfg.max_unconfirmed_age();
        self.purge_unconfirmed_before(admin_key, cutoff).await
    }

    /// Purge unconfirmed accounts created before an explicit cutoff.
    pub async fn purge_unconfirmed_before(
        &self,
        admin_key: &str,
        cutoff: DateTime<Utc>,
    ) -> KeygateResult<u64> {
        self.gate.authorize(admin_key)?;

        let purged = self.store.purge_unconfirmed_before(cutoff).await?;
        info!(purged, %cutoff, "purged unconfirmed users");
        Ok(purged)
    }

    /// Purge sessions idle longer than the configured age.
    pub async fn remove_idle_sessions(&self, admin_key: &str) -> KeygateResult<u64> {
        let cutoff = Utc::now() - self.cfg.max_idle_session_age();
        self.purge_idle_sessions_before(admin_key, cutoff).await
    }

    /// Purge sessions whose last activity predates an explicit cutoff.
    pub async fn purge_idle_sessions_before(
        &self,
        admin_key: &str,
        cutoff: DateTime<Utc>,
    ) -> KeygateResult<u64> {
        self.gate.authorize(admin_key)?;

        let purged = self.store.purge_idle_sessions_before(cutoff).await?;
        info!(purged, %cutoff, "purged idle sessions");
        Ok(purged)
    }
}
