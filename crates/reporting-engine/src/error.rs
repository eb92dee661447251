//! Engine error types.

use reporting_connector::error::ConnectorError;
use reporting_db::DbError;
use thiserror::Error;

/// Why handling an event stopped.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A cross-reference has not been observed yet; the event should be
    /// redelivered later.
    #[error("deferred: {0}")]
    Deferred(String),

    /// The event lacks data needed to act on it. Redelivery will not help.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The ledger store failed.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// A directory or CRM lookup failed.
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidEvent(message.into())
    }
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
