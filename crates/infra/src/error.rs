//! Service-level error shared by the engine, the directories and the queries.

use thiserror::Error;

use stockflow_core::DomainError;

use crate::store::StoreError;

/// Terminal error of one engine or query operation.
///
/// Domain errors and store errors are folded into this enum so callers (the
/// HTTP layer, tests) match on one set of kinds.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any mutation (non-positive quantity, blank field, wrong-kind field).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient stock for item {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },

    #[error("item {item} is referenced by {movements} movement(s)")]
    ItemInUse { item: String, movements: u64 },

    /// Lost a concurrency race; the operation left no trace and may be retried.
    #[error("concurrent modification, retry the operation: {0}")]
    ConflictRetry(String),

    /// A broken internal assumption (never caused by caller input).
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("store failure: {0}")]
    Store(StoreError),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConflictRetry(_))
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::InvalidInput(msg),
            DomainError::InvalidId(msg) => EngineError::InvalidId(msg),
            DomainError::NotFound(what) => EngineError::NotFound(what),
            DomainError::InsufficientStock {
                item,
                available,
                requested,
            } => EngineError::InsufficientStock {
                item,
                available,
                requested,
            },
            DomainError::ItemInUse { item, movements } => EngineError::ItemInUse { item, movements },
            DomainError::InvariantViolation(msg) => EngineError::Invariant(msg),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => EngineError::ConflictRetry(msg),
            other => EngineError::Store(other),
        }
    }
}
