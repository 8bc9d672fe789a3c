//! Configuration management for Marcanet.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Every limit the search engine enforces
//! (result cap, retry budget, deadlines, pool size) is read from here rather
//! than from globals.

use crate::error::{ConfigError, ConfigResult};
use crate::types::SearchMode;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard upper bound on records a phonetic search may return.
pub const MAX_RESULT_CAP: usize = 300;

/// Main application configuration.
///
/// This is loaded from `~/.config/marcanet/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Search engine limits and deadlines
    pub search: SearchConfig,
    /// Browser context pool settings
    pub pool: PoolConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Portal endpoints and markup selectors
    pub portal: PortalConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file is missing.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `MARCANET_POOL_SIZE`: Override the number of browser contexts
    /// - `MARCANET_HEADLESS`: Override browser headless mode (true/false)
    /// - `MARCANET_PORTAL_URL`: Override the portal base URL
    /// - `MARCANET_PARTIAL_ON_TIMEOUT`: Keep partial phonetic results on timeout (true/false)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `MARCANET_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MARCANET_POOL_SIZE") {
            if let Ok(size) = val.parse() {
                self.pool.size = size;
                tracing::debug!("Override pool.size from env: {}", size);
            }
        }

        if let Ok(val) = std::env::var("MARCANET_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("MARCANET_PORTAL_URL") {
            if !val.trim().is_empty() {
                tracing::debug!("Override portal.base_url from env: {}", val);
                self.portal.base_url = val;
            }
        }

        if let Ok(val) = std::env::var("MARCANET_PARTIAL_ON_TIMEOUT") {
            if let Ok(keep) = val.parse() {
                self.search.partial_on_timeout = keep;
                tracing::debug!("Override search.partial_on_timeout from env: {}", keep);
            }
        }
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.search.cap == 0 || self.search.cap > MAX_RESULT_CAP {
            return Err(ConfigError::InvalidValue {
                field: "search.cap".to_string(),
                reason: format!("must be between 1 and {MAX_RESULT_CAP}"),
            });
        }
        if self.search.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.search.max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_pages".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pool.size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool.size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.portal.rows_per_page == 0 {
            return Err(ConfigError::InvalidValue {
                field: "portal.rows_per_page".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        url::Url::parse(&self.portal.base_url).map_err(|e| ConfigError::InvalidValue {
            field: "portal.base_url".to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/marcanet/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("mx", "marcasegura", "marcanet").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Search engine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum records collected by a phonetic search
    pub cap: usize,
    /// Attempts per portal operation (first try included)
    pub max_attempts: u32,
    /// First backoff delay; doubles on each further retry
    pub backoff_base_ms: u64,
    /// Whole-session restarts allowed when the initial submission keeps failing
    pub session_restarts: u32,
    /// Pages visited before pagination is forced to stop
    pub max_pages: usize,
    /// Hard ceiling for a denomination search, retries included
    pub denomination_timeout_secs: u64,
    /// Hard ceiling for a phonetic search, retries included
    pub phonetic_timeout_secs: u64,
    /// Return the records gathered so far when a phonetic search times out
    pub partial_on_timeout: bool,
}

impl SearchConfig {
    /// Base backoff as a `Duration`.
    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Deadline for a search of the given mode.
    #[must_use]
    pub fn deadline(&self, mode: SearchMode) -> Duration {
        match mode {
            SearchMode::Denomination => Duration::from_secs(self.denomination_timeout_secs),
            SearchMode::PhoneticExhaustive => Duration::from_secs(self.phonetic_timeout_secs),
        }
    }

    /// Record cap for a search of the given mode.
    #[must_use]
    pub fn cap_for(&self, mode: SearchMode) -> usize {
        match mode {
            SearchMode::Denomination => 1,
            SearchMode::PhoneticExhaustive => self.cap.min(MAX_RESULT_CAP),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cap: MAX_RESULT_CAP,
            max_attempts: 3,
            backoff_base_ms: 2000,
            session_restarts: 1,
            max_pages: 20,
            denomination_timeout_secs: 20,
            phonetic_timeout_secs: 90,
            partial_on_timeout: true,
        }
    }
}

/// Browser context pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of browser contexts that may exist at once
    pub size: usize,
    /// How long a request may wait for a free context
    pub admission_timeout_secs: u64,
}

impl PoolConfig {
    /// Admission timeout as a `Duration`.
    #[must_use]
    pub fn admission_timeout(&self) -> Duration {
        Duration::from_secs(self.admission_timeout_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 2,
            admission_timeout_secs: 15,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// How long to wait for an element before giving up
    pub element_timeout_ms: u64,
    /// Minimum spacing between navigations to the same host
    pub min_request_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
            element_timeout_ms: 10_000,
            min_request_delay_ms: 2000,
        }
    }
}

/// Portal endpoints and markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Portal root, e.g. `https://acervomarcas.impi.gob.mx:8181/marcanet/`
    pub base_url: String,
    /// Page hosting the denomination form, relative to `base_url`
    pub denomination_path: String,
    /// Page hosting the phonetic form, relative to `base_url`
    pub phonetic_path: String,
    /// Rows the results table shows per page
    pub rows_per_page: usize,
    /// Denomination form selectors
    pub denomination: FormSelectors,
    /// Phonetic form selectors
    pub phonetic: FormSelectors,
    /// Results table selectors shared by both modes
    pub results: ResultSelectors,
    /// Results table column positions
    pub columns: ColumnLayout,
}

impl PortalConfig {
    /// Absolute entry URL for the given search mode.
    pub fn entry_url(&self, mode: SearchMode) -> ConfigResult<String> {
        let path = match mode {
            SearchMode::Denomination => &self.denomination_path,
            SearchMode::PhoneticExhaustive => &self.phonetic_path,
        };
        let base = url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidValue {
            field: "portal.base_url".to_string(),
            reason: e.to_string(),
        })?;
        base.join(path)
            .map(|u| u.to_string())
            .map_err(|e| ConfigError::InvalidValue {
                field: "portal path".to_string(),
                reason: e.to_string(),
            })
    }

    /// Form selectors for the given search mode.
    #[must_use]
    pub fn form(&self, mode: SearchMode) -> &FormSelectors {
        match mode {
            SearchMode::Denomination => &self.denomination,
            SearchMode::PhoneticExhaustive => &self.phonetic,
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://acervomarcas.impi.gob.mx:8181/marcanet/".to_string(),
            denomination_path: "vistas/common/home.pgi".to_string(),
            phonetic_path: "vistas/common/datos/bsqFoneticaCompleta.pgi".to_string(),
            rows_per_page: 15,
            denomination: FormSelectors::denomination(),
            phonetic: FormSelectors::phonetic(),
            results: ResultSelectors::default(),
            columns: ColumnLayout::default(),
        }
    }
}

/// CSS selectors for one search form.
///
/// The portal is a PrimeFaces application whose ids contain `:`, so the
/// defaults use attribute selectors instead of `#id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormSelectors {
    /// The `<form>` element itself
    pub form: String,
    /// Mark name text input
    pub mark_input: String,
    /// Nice class input, when the form has one
    pub class_input: Option<String>,
    /// Search button
    pub submit_button: String,
    /// `<tbody>` holding result rows
    pub results_body: String,
}

impl FormSelectors {
    /// Selectors for the "búsqueda por denominación" form.
    #[must_use]
    pub fn denomination() -> Self {
        Self {
            form: "form[id='frmBsqDen']".to_string(),
            mark_input: "input[id='frmBsqDen:denominacionId']".to_string(),
            class_input: None,
            submit_button: "button[id='frmBsqDen:busquedaIdButton']".to_string(),
            results_body: "tbody[id='frmBsqDen:resultadoExpediente_data']".to_string(),
        }
    }

    /// Selectors for the "búsqueda fonética" form.
    #[must_use]
    pub fn phonetic() -> Self {
        Self {
            form: "form[id='frmBsqFonetica']".to_string(),
            mark_input: "input[id='frmBsqFonetica:denominacion']".to_string(),
            class_input: Some("input[id='frmBsqFonetica:clases']".to_string()),
            submit_button: "button[id='frmBsqFonetica:busquedaId2']".to_string(),
            results_body: "tbody[id='frmBsqFonetica:resultadoExpediente_data']".to_string(),
        }
    }
}

/// CSS selectors for the results table and its paginator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResultSelectors {
    /// Something every rendered portal page has
    pub page_ready: String,
    /// Fallback for the results body when the form-specific id is missing
    pub results_body_fallback: String,
    /// A data row inside the results body
    pub row: String,
    /// A cell inside a row
    pub cell: String,
    /// Shown instead of rows when nothing matched
    pub empty_marker: String,
    /// Paginator "next page" control
    pub paginator_next: String,
    /// Class the paginator adds to disabled controls
    pub paginator_disabled_class: String,
    /// Paginator control for the page currently shown
    pub paginator_active_page: String,
}

impl Default for ResultSelectors {
    fn default() -> Self {
        Self {
            page_ready: "body".to_string(),
            results_body_fallback: "tbody.ui-datatable-data".to_string(),
            row: "tr[data-ri]".to_string(),
            cell: "td".to_string(),
            empty_marker: ".ui-datatable-empty-message".to_string(),
            paginator_next: ".ui-paginator-next".to_string(),
            paginator_disabled_class: "ui-state-disabled".to_string(),
            paginator_active_page: ".ui-paginator-page.ui-state-active".to_string(),
        }
    }
}

/// Zero-based column positions in a results row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnLayout {
    /// Sign type ("TS")
    pub sign_type: usize,
    /// Owner ("Titular")
    pub owner: usize,
    /// File number ("Expediente")
    pub file_number: usize,
    /// Registration number ("Registro")
    pub registration_number: usize,
    /// Mark name ("Denominación")
    pub mark: usize,
    /// Nice class ("Clase")
    pub nice_class: usize,
    /// Status label, when the portal shows one
    pub status: Option<usize>,
    /// Filing date, when the portal shows one
    pub filing_date: Option<usize>,
}

impl ColumnLayout {
    /// Fewest cells a row needs before it is worth parsing.
    #[must_use]
    pub fn min_cells(&self) -> usize {
        [
            self.sign_type,
            self.owner,
            self.file_number,
            self.registration_number,
            self.mark,
            self.nice_class,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            sign_type: 1,
            owner: 3,
            file_number: 4,
            registration_number: 5,
            mark: 6,
            nice_class: 7,
            status: None,
            filing_date: None,
        }
    }
}
