//! Keygate Mail — [`keygate_core::MailDispatcher`] implementations:
//! SMTP delivery for deployments, a logging dispatcher for local
//! development, and a recording mock for tests.

mod mock;
mod smtp;

pub use mock::{LogMailer, MockMailer};
pub use smtp::{SmtpConfig, SmtpMailer};
