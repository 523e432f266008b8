//! Error types for the keygate system.
//!
//! Every engine operation returns one of these variants unmodified;
//! nothing is retried internally. Store and mail transport failures
//! are carried as opaque infrastructure errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeygateError {
    #[error("not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("already exists: {entity}")]
    Conflict { entity: String },

    /// Wrong password, or an email that resolves to no account at the
    /// signin boundary (the two are deliberately indistinguishable).
    #[error("invalid credentials")]
    InvalidCredential,

    #[error("the account has not been confirmed")]
    Unconfirmed,

    /// Bad signature, undecodable token, or a token of the wrong kind.
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// The signature verified but required claims are missing or
    /// mistyped.
    #[error("malformed token: {0}")]
    TokenMalformed(String),

    /// The token is valid but its embedded key no longer matches the
    /// stored one — rotated or already consumed.
    #[error("key mismatch")]
    KeyMismatch,

    #[error("the reset key has expired")]
    TokenExpired,

    #[error("unauthorized")]
    Unauthorized,

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("mail error: {0}")]
    Mail(String),
}

impl KeygateError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
        }
    }
}

pub type KeygateResult<T> = Result<T, KeygateError>;
