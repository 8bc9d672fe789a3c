//! Browser automation for the Marcanet portal.
//!
//! Provides headless Chromium contexts behind the [`BrowserActions`]
//! capability, a per-domain politeness delay, and a bounded pool that
//! shares contexts between concurrent searches.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod pool;

pub use actions::BrowserActions;
pub use engine::{BrowserEngine, ChromiumFactory};
pub use error::{BrowserError, PoolError, Result};
pub use fingerprint::FingerprintConfig;
pub use pool::{ContextFactory, ContextPool, PooledContext};
