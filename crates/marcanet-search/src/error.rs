use marcanet_browser::PoolError;
use marcanet_core::{CoreError, TrademarkRecord};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Portal unreachable: {reason}")]
    PortalUnreachable { reason: String },

    #[error("Form element missing, portal markup may have changed: {selector}")]
    FormNotFound { selector: String },

    #[error("Results page could not be classified: {reason}")]
    ParseAmbiguous { reason: String },

    #[error("Results page does not match the expected layout: {reason}")]
    ParseFailure { reason: String },

    #[error("No browser context became free within {waited:?}")]
    PoolExhausted { waited: Duration },

    #[error("Search timed out after {elapsed:?} with {} records collected", .partial.len())]
    Timeout {
        elapsed: Duration,
        partial: Vec<TrademarkRecord>,
    },

    #[error("Portal unreachable after {attempts} attempts: {reason}")]
    ConnectionError {
        attempts: u32,
        reason: String,
        partial: Vec<TrademarkRecord>,
    },

    #[error("Browser context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl SearchError {
    /// Whether the failure is worth another attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PortalUnreachable { .. } | Self::ParseAmbiguous { .. }
        )
    }

    /// Records collected before the search stopped, if any.
    #[must_use]
    pub fn partial(&self) -> &[TrademarkRecord] {
        match self {
            Self::Timeout { partial, .. } | Self::ConnectionError { partial, .. } => partial,
            _ => &[],
        }
    }
}

impl From<PoolError> for SearchError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Exhausted { waited } => Self::PoolExhausted { waited },
            other => Self::ContextUnavailable(other.to_string()),
        }
    }
}

impl From<CoreError> for SearchError {
    fn from(err: CoreError) -> Self {
        Self::InvalidQuery(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
