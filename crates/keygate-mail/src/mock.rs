//! Non-delivering dispatchers: a logger for local development and a
//! recording mock for the engine test suites.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use keygate_core::{KeygateError, KeygateResult, Mail, MailDispatcher};

/// Logs the message and reports success. Useful when no SMTP relay is
/// available.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl MailDispatcher for LogMailer {
    async fn send(&self, mail: Mail) -> KeygateResult<()> {
        info!(
            to = ?mail.to,
            subject = %mail.subject,
            "mail send stub"
        );
        Ok(())
    }
}

/// Records every dispatched message; can be told to fail on command
/// so callers can exercise delivery-failure paths.
#[derive(Debug, Default)]
pub struct MockMailer {
    sent: Mutex<Vec<Mail>>,
    fail: AtomicBool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail (or succeed again).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("mailer lock poisoned").len()
    }
}

impl MailDispatcher for MockMailer {
    async fn send(&self, mail: Mail) -> KeygateResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(KeygateError::Mail("mock delivery failure".into()));
        }
        self.sent.lock().expect("mailer lock poisoned").push(mail);
        Ok(())
    }
}
