use thiserror::Error;

use crate::change::{ChangeError, RelationshipViolation};
use crate::item::Key;
use crate::pagination::InvalidResumeToken;
use crate::schema::{SchemaError, ShapeError};
use crate::store::StoreError;

/// Errors surfaced by client operations.
///
/// `ItemNotFound`, `OptimisticLock` and `InvalidResumeToken` can be replaced
/// by the caller at the call site. The rest always propagate unchanged.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Item not found: {}", render_keys(keys))]
    ItemNotFound { keys: Vec<Key> },
    #[error("Store made no progress on keys: {}", render_keys(keys))]
    UnprocessedKeys { keys: Vec<Key> },
    #[error("Optimistic lock failed: an item changed since it was read")]
    OptimisticLock,
    #[error(transparent)]
    InvalidResumeToken(#[from] InvalidResumeToken),
    #[error(transparent)]
    ShapeValidation(#[from] ShapeError),
    #[error(transparent)]
    RelationshipViolation(#[from] RelationshipViolation),
    #[error("Item in table {table} has no valid version attribute \"{attribute}\"")]
    ItemWithoutVersion { table: String, attribute: String },
    #[error("Query on {target} cannot use \"{attribute}\" as its {role}")]
    InvalidKeyCondition {
        target: String,
        role: &'static str,
        attribute: String,
    },
    #[error("Item is not tracked by this client")]
    UntrackedItem,
    #[error("Item is already marked for deletion")]
    AlreadyMarkedForDeletion,
    #[error(transparent)]
    Change(#[from] ChangeError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps a caller-defined error, typically from an error override.
    pub fn custom(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Custom(error.into())
    }

    /// Returns the caller-defined error if it has type `E`.
    pub fn downcast_custom<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Custom(error) => error.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ItemNotFound { .. })
    }

    pub fn is_optimistic_lock(&self) -> bool {
        matches!(self, Self::OptimisticLock)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

fn render_keys(keys: &[Key]) -> String {
    keys.iter()
        .map(Key::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
