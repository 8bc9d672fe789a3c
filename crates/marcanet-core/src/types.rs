//! Shared types used across the Marcanet workspace.
//!
//! This module defines the query model handed to the search engine and the
//! normalized record shape it hands back.

use crate::error::CoreError;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Longest mark name the portal form accepts after normalization.
pub const MAX_MARK_LEN: usize = 120;

/// A mark name normalized to the portal's charset.
///
/// Normalization uppercases, drops characters the portal form rejects,
/// collapses runs of whitespace and trims. The result is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkName(String);

impl MarkName {
    /// Normalize and validate a raw mark name.
    ///
    /// # Errors
    /// Returns error if nothing is left after normalization or the name is
    /// longer than [`MAX_MARK_LEN`].
    pub fn new(raw: &str) -> Result<Self, CoreError> {
        static DISALLOWED: OnceLock<Regex> = OnceLock::new();
        static WHITESPACE: OnceLock<Regex> = OnceLock::new();
        let disallowed = DISALLOWED
            .get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s&\-.,'/+!]").expect("valid regex"));
        let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));

        let upper = raw.to_uppercase();
        let kept = disallowed.replace_all(&upper, "");
        let collapsed = whitespace.replace_all(&kept, " ");
        let normalized = collapsed.trim();

        if normalized.is_empty() {
            return Err(CoreError::Validation(format!(
                "mark name is empty after normalization: '{raw}'"
            )));
        }
        if normalized.chars().count() > MAX_MARK_LEN {
            return Err(CoreError::Validation(format!(
                "mark name longer than {MAX_MARK_LEN} characters"
            )));
        }

        Ok(Self(normalized.to_string()))
    }

    /// Get the normalized value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// International (Nice) classification code, 1 through 45.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NiceClass(u8);

impl NiceClass {
    /// Create a `NiceClass`.
    ///
    /// # Errors
    /// Returns error if the code is outside 1..=45.
    pub fn new(code: u8) -> Result<Self, CoreError> {
        if (1..=45).contains(&code) {
            Ok(Self(code))
        } else {
            Err(CoreError::Validation(format!(
                "invalid Nice class: must be 1-45, got {code}"
            )))
        }
    }

    /// Get the numeric code.
    #[must_use]
    pub fn code(self) -> u8 {
        self.0
    }
}

impl fmt::Display for NiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two query modes the portal supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Single-page availability check
    Denomination,
    /// Paginated phonetic similarity search
    PhoneticExhaustive,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denomination => write!(f, "denomination"),
            Self::PhoneticExhaustive => write!(f, "phonetic"),
        }
    }
}

/// A validated search request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueryRequest {
    /// Availability check for one mark name
    Denomination {
        /// Normalized mark name
        mark: MarkName,
    },
    /// Exhaustive phonetic search, optionally scoped to one class
    PhoneticExhaustive {
        /// Normalized mark name
        mark: MarkName,
        /// Optional class filter
        nice_class: Option<NiceClass>,
    },
}

impl QueryRequest {
    /// Build a denomination request from raw input.
    pub fn denomination(raw_mark: &str) -> Result<Self, CoreError> {
        Ok(Self::Denomination {
            mark: MarkName::new(raw_mark)?,
        })
    }

    /// Build a phonetic request from raw input.
    pub fn phonetic(raw_mark: &str, nice_class: Option<u8>) -> Result<Self, CoreError> {
        Ok(Self::PhoneticExhaustive {
            mark: MarkName::new(raw_mark)?,
            nice_class: nice_class.map(NiceClass::new).transpose()?,
        })
    }

    /// The query mode.
    #[must_use]
    pub fn mode(&self) -> SearchMode {
        match self {
            Self::Denomination { .. } => SearchMode::Denomination,
            Self::PhoneticExhaustive { .. } => SearchMode::PhoneticExhaustive,
        }
    }

    /// The normalized mark name.
    #[must_use]
    pub fn mark(&self) -> &MarkName {
        match self {
            Self::Denomination { mark } | Self::PhoneticExhaustive { mark, .. } => mark,
        }
    }

    /// The class filter, if any.
    #[must_use]
    pub fn nice_class(&self) -> Option<NiceClass> {
        match self {
            Self::Denomination { .. } => None,
            Self::PhoneticExhaustive { nice_class, .. } => *nice_class,
        }
    }
}

/// Registry status of a mark.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Granted and in force
    Registered,
    /// Application still being examined
    Pending,
    /// Lapsed, cancelled or not renewed
    Expired,
    /// Under opposition
    Opposed,
    /// Not shown or not recognized
    #[default]
    Unknown,
}

impl RecordStatus {
    /// Map a Spanish portal status label onto a status.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_uppercase();
        let has = |needle: &str| label.contains(needle);

        if has("OPOSICI") || has("OPUEST") {
            Self::Opposed
        } else if has("CADUC") || has("VENCID") || has("CANCELAD") || has("EXTINT") {
            Self::Expired
        } else if has("TRÁMITE") || has("TRAMITE") || has("PENDIENTE") || has("EXAMEN") {
            Self::Pending
        } else if has("REGISTRAD") || has("VIGENTE") || has("CONCEDID") {
            Self::Registered
        } else {
            Self::Unknown
        }
    }
}

/// One normalized registry record.
///
/// Equality and hashing use only `registration_or_file_number`; two rows with
/// the same key are the same record no matter what else differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrademarkRecord {
    /// Registration number when granted, otherwise the file number
    pub registration_or_file_number: String,
    /// Mark name as the portal shows it
    pub mark_name: String,
    /// Nice classes the record covers
    pub nice_classes: BTreeSet<u8>,
    /// Registry status
    pub status: RecordStatus,
    /// Owner ("titular")
    pub owner: Option<String>,
    /// Filing date
    pub filing_date: Option<NaiveDate>,
    /// File number ("expediente")
    pub file_number: Option<String>,
    /// Registration number
    pub registration_number: Option<String>,
    /// Sign type code ("TS" column)
    pub sign_type: Option<String>,
}

impl TrademarkRecord {
    /// Create a record with only its key and mark name set.
    #[must_use]
    pub fn new(key: impl Into<String>, mark_name: impl Into<String>) -> Self {
        Self {
            registration_or_file_number: key.into(),
            mark_name: mark_name.into(),
            nice_classes: BTreeSet::new(),
            status: RecordStatus::Unknown,
            owner: None,
            filing_date: None,
            file_number: None,
            registration_number: None,
            sign_type: None,
        }
    }

    /// The deduplication key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.registration_or_file_number
    }
}

impl PartialEq for TrademarkRecord {
    fn eq(&self, other: &Self) -> bool {
        self.registration_or_file_number == other.registration_or_file_number
    }
}

impl Eq for TrademarkRecord {}

impl Hash for TrademarkRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.registration_or_file_number.hash(state);
    }
}

/// Outcome of a denomination search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominationStatus {
    /// No exact or near match was found
    PossiblyAvailable,
    /// An exact or near match exists and needs human review
    RequiresAnalysis,
    /// The portal could not be reached within the retry budget
    ConnectionError,
}

/// Result of a denomination search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenominationResult {
    /// Availability status
    pub status: DenominationStatus,
}

impl DenominationResult {
    /// Wrap a status.
    #[must_use]
    pub fn new(status: DenominationStatus) -> Self {
        Self { status }
    }
}

/// Result of a phonetic search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhoneticResult {
    /// Deduplicated records in portal order
    pub records: Vec<TrademarkRecord>,
    /// True when the portal had more results than were collected
    pub truncated: bool,
    /// Total the portal claimed, when it said
    pub total_reported: Option<usize>,
    /// Results pages read
    pub pages_visited: usize,
    /// Rows skipped as unparseable
    pub skipped_rows: usize,
}

impl PhoneticResult {
    /// Records that are granted and in force.
    pub fn in_force(&self) -> impl Iterator<Item = &TrademarkRecord> {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Registered)
    }

    /// Records grouped by Nice class, in portal order within each class.
    ///
    /// A record covering several classes appears under each of them.
    #[must_use]
    pub fn by_class(&self) -> BTreeMap<u8, Vec<&TrademarkRecord>> {
        let mut groups: BTreeMap<u8, Vec<&TrademarkRecord>> = BTreeMap::new();
        for record in &self.records {
            for class in &record.nice_classes {
                groups.entry(*class).or_default().push(record);
            }
        }
        groups
    }

    /// Number of records per registry status.
    #[must_use]
    pub fn count_by_status(&self) -> BTreeMap<RecordStatus, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }
}
