use crate::error::{Result, SearchError};
use chrono::NaiveDate;
use marcanet_core::{
    ColumnLayout, PortalConfig, RecordStatus, SearchMode, TrademarkRecord,
};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// What one results page yielded.
#[derive(Debug, Clone, Default)]
pub struct PageParseResult {
    pub records: Vec<TrademarkRecord>,
    pub has_next_page: bool,
    pub skipped_rows: usize,
    pub total_reported: Option<usize>,
}

impl PageParseResult {
    /// Data rows on the page, parseable or not.
    pub fn row_count(&self) -> usize {
        self.records.len() + self.skipped_rows
    }
}

fn total_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)total\s+de\s+registros\s*[=:]\s*(\d[\d,.]*)")
            .expect("valid regex")
    })
}

fn remaining_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\by\s+(\d[\d,.]*)\s+marcas?\s+m[aá]s").expect("valid regex")
    })
}

fn class_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| SearchError::ParseFailure {
        reason: format!("invalid selector {selector}: {e}"),
    })
}

/// Parses one rendered results page into records.
pub struct ResultPageParser {
    results_body: Selector,
    results_body_fallback: Selector,
    row: Selector,
    cell: Selector,
    empty_marker: Selector,
    paginator_next: Selector,
    disabled_class: String,
    columns: ColumnLayout,
    rows_per_page: usize,
}

impl ResultPageParser {
    pub fn new(portal: &PortalConfig, mode: SearchMode) -> Result<Self> {
        let results = &portal.results;
        Ok(Self {
            results_body: compile(&portal.form(mode).results_body)?,
            results_body_fallback: compile(&results.results_body_fallback)?,
            row: compile(&results.row)?,
            cell: compile(&results.cell)?,
            empty_marker: compile(&results.empty_marker)?,
            paginator_next: compile(&results.paginator_next)?,
            disabled_class: results.paginator_disabled_class.clone(),
            columns: portal.columns.clone(),
            rows_per_page: portal.rows_per_page,
        })
    }

    pub fn parse(&self, html: &str) -> Result<PageParseResult> {
        if html.trim().is_empty() {
            return Err(SearchError::ParseAmbiguous {
                reason: "blank document".to_string(),
            });
        }

        let document = Html::parse_document(html);

        if document.select(&self.empty_marker).next().is_some() {
            return Ok(PageParseResult::default());
        }

        let body = document
            .select(&self.results_body)
            .next()
            .or_else(|| document.select(&self.results_body_fallback).next());

        let Some(body) = body else {
            let has_content = document
                .root_element()
                .text()
                .any(|t| !t.trim().is_empty());
            return Err(if has_content {
                SearchError::ParseFailure {
                    reason: "neither a results table nor the empty-result marker".to_string(),
                }
            } else {
                SearchError::ParseAmbiguous {
                    reason: "document has no content".to_string(),
                }
            });
        };

        let rows: Vec<ElementRef> = body.select(&self.row).collect();
        if rows.is_empty() {
            return Err(SearchError::ParseAmbiguous {
                reason: "results table has no rows".to_string(),
            });
        }

        let mut result = PageParseResult::default();
        for (index, row) in rows.iter().enumerate() {
            let cells: Vec<String> = row.select(&self.cell).map(|c| cell_text(&c)).collect();
            match self.parse_row(&cells) {
                Some(record) => result.records.push(record),
                None => {
                    tracing::warn!(
                        "Skipping unparseable results row {} ({} cells)",
                        index,
                        cells.len()
                    );
                    result.skipped_rows += 1;
                }
            }
        }

        result.has_next_page = self.has_next_page(&document, rows.len());
        result.total_reported = extract_total(&document, rows.len());
        Ok(result)
    }

    fn parse_row(&self, cells: &[String]) -> Option<TrademarkRecord> {
        if cells.len() < self.columns.min_cells() {
            return None;
        }
        let cell = |index: usize| {
            cells
                .get(index)
                .map(String::as_str)
                .filter(|text| !text.is_empty() && *text != "-")
        };

        let registration_number = cell(self.columns.registration_number);
        let file_number = cell(self.columns.file_number);
        let key = registration_number.or(file_number)?;
        let mark = cell(self.columns.mark)?;
        let nice_classes = parse_classes(cell(self.columns.nice_class)?);
        if nice_classes.is_empty() {
            return None;
        }

        let mut record = TrademarkRecord::new(key, mark);
        record.nice_classes = nice_classes;
        record.owner = cell(self.columns.owner).map(str::to_string);
        record.file_number = file_number.map(str::to_string);
        record.registration_number = registration_number.map(str::to_string);
        record.sign_type = cell(self.columns.sign_type).map(str::to_string);
        record.status = self
            .columns
            .status
            .and_then(cell)
            .map(RecordStatus::from_label)
            .unwrap_or_default();
        record.filing_date = self.columns.filing_date.and_then(cell).and_then(parse_date);
        Some(record)
    }

    fn has_next_page(&self, document: &Html, row_count: usize) -> bool {
        match document.select(&self.paginator_next).next() {
            Some(next) => !next
                .value()
                .classes()
                .any(|class| class == self.disabled_class),
            None => row_count >= self.rows_per_page,
        }
    }
}

/// Cell text with whitespace collapsed.
fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classes in a cell such as `25` or `25, 35`; out-of-range codes are dropped.
fn parse_classes(text: &str) -> BTreeSet<u8> {
    class_pattern()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u8>().ok())
        .filter(|code| (1..=45).contains(code))
        .collect()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn parse_count(digits: &str) -> Option<usize> {
    digits
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()
}

fn extract_total(document: &Html, rows_on_page: usize) -> Option<usize> {
    let text: String = document.root_element().text().collect();

    if let Some(caps) = total_pattern().captures(&text) {
        return parse_count(&caps[1]);
    }
    remaining_pattern()
        .captures(&text)
        .and_then(|caps| parse_count(&caps[1]))
        .map(|more| rows_on_page + more)
}
