//! Store-layer error types and conversions.

use keygate_core::KeygateError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("uniqueness violation: {entity}")]
    Conflict { entity: String },

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Classify a query error: a unique-index violation is a
    /// `Conflict`, anything else stays an opaque transport error.
    pub(crate) fn conflict_or(err: surrealdb::Error, entity: &str) -> Self {
        if err.to_string().contains("already contains") {
            StoreError::Conflict {
                entity: entity.to_string(),
            }
        } else {
            StoreError::Surreal(err)
        }
    }
}

impl From<StoreError> for KeygateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => KeygateError::NotFound { entity, id },
            StoreError::Conflict { entity } => KeygateError::Conflict { entity },
            other => KeygateError::Store(other.to_string()),
        }
    }
}
