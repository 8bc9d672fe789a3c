//! Marcanet Search - trademark registry searches.
//!
//! This crate drives the Marcanet portal's search forms through pooled browser
//! contexts and turns the rendered results into normalized records. It covers
//! both query modes the portal offers:
//!
//! - Denomination search: one page, answered with an availability status
//! - Phonetic search: every results page, up to 300 deduplicated records
//!
//! Portal failures are retried with exponential backoff, each search runs under
//! a hard deadline, and a context that saw a failure is closed rather than
//! reused.
//!
//! # Example
//!
//! ```rust,ignore
//! use marcanet_browser::ChromiumFactory;
//! use marcanet_core::AppConfig;
//! use marcanet_search::SearchOrchestrator;
//!
//! let config = AppConfig::load_with_env()?;
//! let orchestrator =
//!     SearchOrchestrator::new(ChromiumFactory::new(config.browser.clone()), &config)?;
//!
//! let status = orchestrator.search_denomination("Luna Azul").await?;
//! let similar = orchestrator.search_phonetic_exhaustive("Luna Azul", Some(30)).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod error;
pub mod form;
pub mod orchestrator;
pub mod paginator;
#[allow(missing_docs)]
pub mod parser;
#[allow(missing_docs)]
pub mod ranking;
pub mod retry;
#[allow(missing_docs)]
pub mod session;

// Re-export commonly used types
pub use error::{Result, SearchError};
pub use form::{FormSubmitOutcome, PortalFormClient};
pub use orchestrator::SearchOrchestrator;
pub use paginator::Paginator;
pub use parser::{PageParseResult, ResultPageParser};
pub use ranking::{
    HeuristicRanker, RankingRequest, RiskAssessment, RiskLevel, RiskRanker, ScoredRecord,
    ViabilityBand,
};
pub use retry::{RetryController, RetryFailure, RetryPolicy};
pub use session::{SearchSession, SessionState};
