//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// illegal transitions, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (malformed input, cross-hub reference,
    /// non-positive amount, out-of-range tax rate).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An illegal status transition was requested. State is unchanged.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A concurrency conflict occurred (stale version / lost update).
    /// The caller should retry the operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Deletion refused because dependent records still reference the target.
    #[error("has dependents: {0}")]
    HasDependents(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn has_dependents(msg: impl Into<String>) -> Self {
        Self::HasDependents(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
