//! Per-request search state.

use marcanet_core::{PhoneticResult, QueryRequest, SearchMode, TrademarkRecord};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, nothing submitted yet
    Init,
    /// Form submitted or page advanced; waiting for the results region
    Submitted,
    /// Results region confirmed
    PageReady,
    /// Reading the current page
    Parsing,
    /// About to move to the following page
    NextPage,
    /// Finished normally
    Done,
    /// Finished on a failure that retrying could not fix
    Error,
}

impl SessionState {
    /// Whether the session can make no further progress.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    fn can_move_to(self, next: Self) -> bool {
        use SessionState::{Done, Error, Init, NextPage, PageReady, Parsing, Submitted};
        match (self, next) {
            // Init -> Init is a restart after the submission budget ran out
            (Init, Init | Submitted | Done) => true,
            (Submitted, PageReady) => true,
            (PageReady, Parsing | Done) => true,
            (Parsing, NextPage | Done) => true,
            (NextPage, Submitted) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State of one search request.
///
/// Owned by exactly one orchestrator call and dropped with it. Records are
/// kept in portal order, deduplicated by key and never more than `cap`.
#[derive(Debug)]
pub struct SearchSession {
    id: Uuid,
    request: QueryRequest,
    state: SessionState,
    page_index: usize,
    accumulated: Vec<TrademarkRecord>,
    seen: HashSet<String>,
    cap: usize,
    /// Attempts made across every retried operation
    pub attempt_count: u32,
    /// Full restarts from `Init` so far
    pub restarts: u32,
    /// Rows skipped as unparseable across all pages
    pub skipped_rows: usize,
    /// Total the portal last claimed
    pub total_reported: Option<usize>,
    /// More results existed than were collected
    pub truncated: bool,
    /// Results pages read
    pub pages_visited: usize,
    /// Data rows seen on the last page, parseable or not
    pub last_page_rows: usize,
}

impl SearchSession {
    /// Start a session in `Init`.
    #[must_use]
    pub fn new(request: QueryRequest, cap: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            state: SessionState::Init,
            page_index: 0,
            accumulated: Vec::new(),
            seen: HashSet::new(),
            cap: cap.max(1),
            attempt_count: 0,
            restarts: 0,
            skipped_rows: 0,
            total_reported: None,
            truncated: false,
            pages_visited: 0,
            last_page_rows: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    #[must_use]
    pub fn mode(&self) -> SearchMode {
        self.request.mode()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }

    #[must_use]
    pub fn records(&self) -> &[TrademarkRecord] {
        &self.accumulated
    }

    /// Whether the cap has been reached.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.accumulated.len() >= self.cap
    }

    /// Move to `next`, refusing transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_move_to(next) {
            tracing::error!(
                "Session {}: invalid transition {} -> {}",
                self.id,
                self.state,
                next
            );
            return false;
        }
        tracing::debug!("Session {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        true
    }

    /// Advance to the following results page.
    pub fn next_page(&mut self) {
        self.page_index += 1;
    }

    /// Go back to `Init` for a full restart, keeping what was collected.
    pub fn restart(&mut self) -> bool {
        if self.transition(SessionState::Init) {
            self.restarts += 1;
            self.page_index = 0;
            true
        } else {
            false
        }
    }

    /// Append new records in order, skipping known keys and stopping at the cap.
    ///
    /// Returns how many were added. Sets `truncated` when records had to be
    /// left out because the cap was reached.
    pub fn absorb(&mut self, records: Vec<TrademarkRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if self.seen.contains(record.key()) {
                continue;
            }
            if self.is_full() {
                self.truncated = true;
                break;
            }
            self.seen.insert(record.key().to_string());
            self.accumulated.push(record);
            added += 1;
        }
        added
    }

    /// Records collected so far, leaving the session empty.
    pub fn take_records(&mut self) -> Vec<TrademarkRecord> {
        self.seen.clear();
        std::mem::take(&mut self.accumulated)
    }

    /// Consume the session into a phonetic result.
    #[must_use]
    pub fn into_phonetic_result(self) -> PhoneticResult {
        PhoneticResult {
            records: self.accumulated,
            truncated: self.truncated,
            total_reported: self.total_reported,
            pages_visited: self.pages_visited,
            skipped_rows: self.skipped_rows,
        }
    }
}
