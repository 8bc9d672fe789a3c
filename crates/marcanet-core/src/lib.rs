//! Marcanet Core - Foundation crate for the Marcanet registry search engine.
//!
//! This crate provides the query and record model, mark-name normalization,
//! configuration management and the shared error type that the browser and
//! search crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Query and record types (`QueryRequest`, `TrademarkRecord`, `DenominationResult`)
//!
//! # Example
//!
//! ```rust
//! use marcanet_core::{AppConfig, QueryRequest, SearchMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let request = QueryRequest::phonetic("  café luna ", Some(30))?;
//!
//! assert_eq!(request.mark().as_str(), "CAFÉ LUNA");
//! assert_eq!(config.search.cap_for(SearchMode::PhoneticExhaustive), 300);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, ColumnLayout, FormSelectors, PoolConfig, PortalConfig,
    ResultSelectors, SearchConfig, MAX_RESULT_CAP,
};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use types::{
    DenominationResult, DenominationStatus, MarkName, NiceClass, PhoneticResult, QueryRequest,
    RecordStatus, SearchMode, TrademarkRecord,
};
