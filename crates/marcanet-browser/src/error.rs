use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("browser context already closed")]
    Closed,
}

impl BrowserError {
    /// Whether the failure came from the network or the browser process
    /// rather than from the page markup.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::ChromiumError(_) | Self::NavigationError(_) | Self::Timeout(_) | Self::Closed
        )
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::ChromiumError(err.to_string())
    }
}

/// Errors from the context pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no browser context became free within {waited:?}")]
    Exhausted { waited: Duration },

    #[error("failed to launch browser context: {0}")]
    Launch(#[source] BrowserError),

    #[error("context pool is shut down")]
    Closed,
}
