use thiserror::Error;

/// Error kinds surfaced by the store and session layers. Callers match
/// on the kind to decide between "not found" UI, input validation hints,
/// and retry affordances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// A referenced message id or chat id does not exist in the store.
    #[error("{0} not found")]
    NotFound(String),

    /// The request was malformed: empty content, missing required fields,
    /// or an unparseable seed fixture.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The (simulated) transport failed; the operation may be retried.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ChatError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
