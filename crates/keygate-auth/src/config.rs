//! Engine configuration.
//!
//! An immutable value injected once at construction. Loading it from
//! TOML/env is the caller's concern; rotating `token_key` invalidates
//! every outstanding token (accepted trade-off).

use std::collections::HashMap;

use chrono::Duration;

/// Per-language subject and body for one mail kind. The body is an
/// HTML template with a `{token}` placeholder.
#[derive(Debug, Clone)]
pub struct MailTemplate {
    pub subject: String,
    pub body: String,
}

/// Configuration for the authentication engine and sweeper.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Deployment secret gating admin operations.
    pub admin_key: String,
    /// Symmetric HS256 signing key for all token kinds.
    pub token_key: String,
    /// Sender address for confirmation and reset mail.
    pub from_email: String,
    /// Unconfirmed accounts older than this are purgeable.
    pub max_unconfirmed_age_secs: u64,
    /// Sessions idle longer than this are purgeable.
    pub max_idle_session_age_secs: u64,
    /// Reset keys older than this are rejected as expired.
    pub max_reset_key_age_secs: u64,
    /// Bound on each mail dispatch.
    pub mail_timeout_secs: u64,
    /// Confirmation mail templates, keyed by language tag.
    pub confirmation_mail: HashMap<String, MailTemplate>,
    /// Reset-password mail templates, keyed by language tag.
    pub reset_mail: HashMap<String, MailTemplate>,
}

impl AuthConfig {
    pub fn max_unconfirmed_age(&self) -> Duration {
        Duration::seconds(self.max_unconfirmed_age_secs as i64)
    }

    pub fn max_idle_session_age(&self) -> Duration {
        Duration::seconds(self.max_idle_session_age_secs as i64)
    }

    pub fn max_reset_key_age(&self) -> Duration {
        Duration::seconds(self.max_reset_key_age_secs as i64)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_key: String::new(),
            token_key: String::new(),
            from_email: String::new(),
            max_unconfirmed_age_secs: 7 * 24 * 3600,
            max_idle_session_age_secs: 30 * 24 * 3600,
            max_reset_key_age_secs: 24 * 3600,
            mail_timeout_secs: 10,
            confirmation_mail: HashMap::new(),
            reset_mail: HashMap::new(),
        }
    }
}
