use thiserror::Error;

/// Cancellation code reported for a transaction item whose condition failed.
pub const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

/// Why one operation of a cancelled transaction was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CancellationReason {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl CancellationReason {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_conditional_check_failure(&self) -> bool {
        self.code.as_deref() == Some(CONDITIONAL_CHECK_FAILED)
    }

    /// Operations that did not cause the cancellation report `None` (or no
    /// code at all).
    pub fn is_none(&self) -> bool {
        matches!(self.code.as_deref(), None | Some("None"))
    }
}

/// Errors reported by a [`Store`](super::Store).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transaction cancelled: {reasons:?}")]
    TransactionCanceled { reasons: Vec<CancellationReason> },
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Request throttled: {0}")]
    Throttled(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Conversion error: {0}")]
    Conversion(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Returns true when a transaction was cancelled only because one or more
    /// condition checks failed.
    pub fn is_optimistic_lock_failure(&self) -> bool {
        match self {
            Self::TransactionCanceled { reasons } => {
                reasons.iter().any(CancellationReason::is_conditional_check_failure)
                    && reasons
                        .iter()
                        .all(|r| r.is_conditional_check_failure() || r.is_none())
            }
            _ => false,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
