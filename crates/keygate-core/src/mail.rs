//! Mail dispatcher contract.
//!
//! Delivery is fire-and-forget from the engine's perspective: any
//! error is surfaced as-is and never retried here. Retries, if any,
//! belong to the dispatcher implementation.

use std::sync::Arc;

use crate::error::KeygateResult;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    /// HTML body.
    pub body: String,
}

pub trait MailDispatcher: Send + Sync {
    fn send(&self, mail: Mail) -> impl Future<Output = KeygateResult<()>> + Send;
}

impl<M: MailDispatcher> MailDispatcher for Arc<M> {
    fn send(&self, mail: Mail) -> impl Future<Output = KeygateResult<()>> + Send {
        (**self).send(mail)
    }
}
