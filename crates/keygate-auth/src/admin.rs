//! Admin gate for privileged operations.

use tracing::warn;

use keygate_core::{KeygateError, KeygateResult};

/// Compares a presented secret against the configured administrator
/// key. The key is a deployment secret, not a user credential, so a
/// direct string comparison is the whole contract.
#[derive(Debug, Clone)]
pub struct AdminGate {
    key: String,
}

impl AdminGate {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// `Unauthorized` on mismatch; gated operations must return before
    /// touching the store.
    pub fn authorize(&self, presented_key: &str) -> KeygateResult<()> {
        if presented_key != self.key {
            warn!("admin authorization failed");
            return Err(KeygateError::Unauthorized);
        }
        Ok(())
    }
}
