use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Conflict: {entity_type} with id {id} already exists")]
    Conflict { entity_type: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Operation exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),
}

/// Coarse classification callers branch on when mapping errors to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Conflict,
    Storage,
    Timeout,
}

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidInput { .. } => ErrorKind::InvalidArgument,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Database(_) | Self::Migration(_) | Self::Config(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(entity_type: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Rewrites a unique-constraint violation into `Conflict`; other errors pass through.
    pub(crate) fn conflict_on_unique(err: sqlx::Error, entity_type: &str, id: impl ToString) -> Self {
        let unique = err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);

        if unique {
            Self::Conflict {
                entity_type: entity_type.to_string(),
                id: id.to_string(),
            }
        } else {
            Self::Database(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
