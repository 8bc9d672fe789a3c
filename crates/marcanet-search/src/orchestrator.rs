//! Search orchestrator.
//!
//! This module provides the `SearchOrchestrator`, the entry point for both
//! search modes. Each call leases one browser context from the pool, runs a
//! session against it under a hard deadline, and hands the context back (or
//! closes it when anything went wrong).

use crate::error::{Result, SearchError};
use crate::paginator::Paginator;
use crate::session::SearchSession;
use marcanet_browser::{ContextFactory, ContextPool};
use marcanet_core::{
    AppConfig, DenominationResult, DenominationStatus, PhoneticResult, QueryRequest, SearchConfig,
    SearchMode,
};
use std::sync::Arc;
use tokio::time::Instant;

/// Coordinates searches over a bounded pool of browser contexts.
pub struct SearchOrchestrator<F: ContextFactory> {
    /// Pool of browser contexts shared by concurrent searches
    pool: Arc<ContextPool<F>>,
    /// Session state machine
    paginator: Paginator,
    /// Caps, deadlines and timeout policy
    search: SearchConfig,
}

impl<F: ContextFactory> SearchOrchestrator<F> {
    /// Create an orchestrator that launches contexts with `factory`.
    pub fn new(factory: F, config: &AppConfig) -> Result<Self> {
        let pool = ContextPool::new(factory, config.pool.size, config.pool.admission_timeout());
        Ok(Self {
            pool: Arc::new(pool),
            paginator: Paginator::new(config)?,
            search: config.search.clone(),
        })
    }

    /// The context pool, for inspection and shutdown.
    #[must_use]
    pub fn pool(&self) -> &Arc<ContextPool<F>> {
        &self.pool
    }

    /// Check whether a mark name looks available.
    ///
    /// An exhausted retry budget is reported as
    /// [`DenominationStatus::ConnectionError`] rather than as an error.
    pub async fn search_denomination(&self, mark: &str) -> Result<DenominationResult> {
        let request = QueryRequest::denomination(mark)?;
        let cap = self.search.cap_for(SearchMode::Denomination);
        let mut session = SearchSession::new(request, cap);

        match self.execute(&mut session).await {
            Ok(()) => {
                let status = if session.last_page_rows == 0 {
                    DenominationStatus::PossiblyAvailable
                } else {
                    DenominationStatus::RequiresAnalysis
                };
                tracing::info!("Denomination search for {}: {:?}", mark, status);
                Ok(DenominationResult::new(status))
            }
            Err(SearchError::ConnectionError { attempts, .. }) => {
                tracing::warn!(
                    "Denomination search for {} gave up after {} attempts",
                    mark,
                    attempts
                );
                Ok(DenominationResult::new(DenominationStatus::ConnectionError))
            }
            Err(SearchError::Timeout { elapsed, .. }) => Err(SearchError::Timeout {
                elapsed,
                partial: Vec::new(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Collect every phonetically similar record, up to the cap.
    pub async fn search_phonetic_exhaustive(
        &self,
        mark: &str,
        nice_class: Option<u8>,
    ) -> Result<PhoneticResult> {
        let request = QueryRequest::phonetic(mark, nice_class)?;
        let cap = self.search.cap_for(SearchMode::PhoneticExhaustive);
        let mut session = SearchSession::new(request, cap);

        match self.execute(&mut session).await {
            Ok(()) => {
                let result = session.into_phonetic_result();
                tracing::info!(
                    "Phonetic search for {}: {} records (truncated: {})",
                    mark,
                    result.records.len(),
                    result.truncated
                );
                Ok(result)
            }
            Err(SearchError::Timeout { elapsed, .. }) => {
                let partial = if self.search.partial_on_timeout {
                    session.take_records()
                } else {
                    Vec::new()
                };
                Err(SearchError::Timeout { elapsed, partial })
            }
            Err(e) => Err(e),
        }
    }

    /// Run `session` on a leased context under the mode's deadline.
    ///
    /// The lease goes back to the pool only when the session finished
    /// cleanly; on error or timeout the context is closed first.
    async fn execute(&self, session: &mut SearchSession) -> Result<()> {
        let mode = session.mode();
        let deadline = self.search.deadline(mode);

        let lease = self.pool.acquire().await?;
        tracing::debug!(
            "Session {} leased a context ({} free)",
            session.id(),
            self.pool.available()
        );

        // Only borrowed by the run future: records stay in the session when
        // the deadline drops it
        let started = Instant::now();
        let outcome = tokio::time::timeout(deadline, self.paginator.run(&*lease, session)).await;

        match outcome {
            Ok(Ok(())) => {
                lease.release();
                Ok(())
            }
            Ok(Err(e)) => {
                lease.discard().await;
                Err(e)
            }
            Err(_) => {
                let elapsed = started.elapsed();
                tracing::warn!(
                    "Session {}: {} search timed out after {:?} with {} records",
                    session.id(),
                    mode,
                    elapsed,
                    session.records().len()
                );
                lease.discard().await;
                Err(SearchError::Timeout {
                    elapsed,
                    partial: Vec::new(),
                })
            }
        }
    }
}
