//! The session state machine.
//!
//! Drives one [`SearchSession`] from `Init` to `Done` or `Error`, one step at
//! a time, wrapping every portal interaction in the retry controller.

use crate::error::{Result, SearchError};
use crate::form::{FormSubmitOutcome, PortalFormClient};
use crate::parser::{PageParseResult, ResultPageParser};
use crate::retry::{RetryController, RetryFailure, RetryPolicy};
use crate::session::{SearchSession, SessionState};
use marcanet_browser::BrowserActions;
use marcanet_core::{AppConfig, SearchMode};

/// Runs sessions against one browser context at a time.
pub struct Paginator {
    form: PortalFormClient,
    denomination_parser: ResultPageParser,
    phonetic_parser: ResultPageParser,
    retry: RetryController,
    session_restarts: u32,
    max_pages: usize,
}

impl Paginator {
    /// Build from configuration; fails when a configured selector is invalid.
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            form: PortalFormClient::new(config.portal.clone(), config.browser.element_timeout_ms),
            denomination_parser: ResultPageParser::new(&config.portal, SearchMode::Denomination)?,
            phonetic_parser: ResultPageParser::new(
                &config.portal,
                SearchMode::PhoneticExhaustive,
            )?,
            retry: RetryController::new(RetryPolicy::from(&config.search)),
            session_restarts: config.search.session_restarts,
            max_pages: config.search.max_pages.max(1),
        })
    }

    fn parser(&self, mode: SearchMode) -> &ResultPageParser {
        match mode {
            SearchMode::Denomination => &self.denomination_parser,
            SearchMode::PhoneticExhaustive => &self.phonetic_parser,
        }
    }

    /// Drive `session` until it reaches a terminal state.
    ///
    /// Records collected before a failure stay in the session. An exhausted
    /// retry budget surfaces as [`SearchError::ConnectionError`].
    pub async fn run<C>(&self, ctx: &C, session: &mut SearchSession) -> Result<()>
    where
        C: BrowserActions + ?Sized,
    {
        tracing::info!(
            "Session {}: {} search for {}",
            session.id(),
            session.mode(),
            session.request().mark()
        );

        while !session.state().is_terminal() {
            let step = match session.state() {
                SessionState::Init => self.submit(ctx, session).await,
                SessionState::Submitted => self.confirm_page(ctx, session).await,
                SessionState::PageReady => self.page_ready(ctx, session).await,
                SessionState::Parsing => self.parse_page(ctx, session).await,
                SessionState::NextPage => self.advance(ctx, session).await,
                SessionState::Done | SessionState::Error => break,
            };

            if let Err(mut e) = step {
                if let SearchError::ConnectionError { partial, .. } = &mut e {
                    *partial = session.records().to_vec();
                }
                session.transition(SessionState::Error);
                tracing::warn!("Session {} failed: {}", session.id(), e);
                return Err(e);
            }
        }

        tracing::info!(
            "Session {} done: {} records from {} pages",
            session.id(),
            session.records().len(),
            session.pages_visited
        );
        Ok(())
    }

    async fn submit<C>(&self, ctx: &C, session: &mut SearchSession) -> Result<()>
    where
        C: BrowserActions + ?Sized,
    {
        let request = session.request().clone();
        let outcome = self
            .retry
            .run("Form submission", &mut session.attempt_count, |_| {
                self.form.submit(ctx, &request)
            })
            .await;

        match outcome {
            Ok(FormSubmitOutcome::ResultsReady) => {
                session.transition(SessionState::Submitted);
                Ok(())
            }
            Ok(FormSubmitOutcome::NoResults) => {
                tracing::info!("Session {}: portal reported no results", session.id());
                session.transition(SessionState::Done);
                Ok(())
            }
            Err(RetryFailure::Exhausted(e)) if session.restarts < self.session_restarts => {
                tracing::warn!(
                    "Session {}: submission budget exhausted ({}), restarting",
                    session.id(),
                    e
                );
                session.restart();
                Ok(())
            }
            Err(failure) => Err(give_up(failure, session.attempt_count)),
        }
    }

    async fn confirm_page<C>(&self, ctx: &C, session: &mut SearchSession) -> Result<()>
    where
        C: BrowserActions + ?Sized,
    {
        let mode = session.mode();
        self.retry
            .run("Page load", &mut session.attempt_count, |_| {
                self.form.wait_for_results(ctx, mode)
            })
            .await
            .map_err(|failure| give_up(failure, session.attempt_count))?;
        session.transition(SessionState::PageReady);
        Ok(())
    }

    async fn page_ready<C>(&self, ctx: &C, session: &mut SearchSession) -> Result<()>
    where
        C: BrowserActions + ?Sized,
    {
        if session.mode() == SearchMode::PhoneticExhaustive {
            session.transition(SessionState::Parsing);
            return Ok(());
        }

        // Denomination: the single page decides
        let page = self.read_page(ctx, session).await?;
        session.pages_visited = 1;
        session.skipped_rows = page.skipped_rows;
        session.last_page_rows = page.row_count();
        session.absorb(page.records);
        session.transition(SessionState::Done);
        Ok(())
    }

    async fn parse_page<C>(&self, ctx: &C, session: &mut SearchSession) -> Result<()>
    where
        C: BrowserActions + ?Sized,
    {
        let page = self.read_page(ctx, session).await?;
        let has_next = page.has_next_page;

        session.pages_visited += 1;
        session.skipped_rows += page.skipped_rows;
        session.last_page_rows = page.row_count();
        if page.total_reported.is_some() {
            session.total_reported = page.total_reported;
        }
        let added = session.absorb(page.records);

        tracing::debug!(
            "Session {}: page {} added {} records ({} total)",
            session.id(),
            session.page_index() + 1,
            added,
            session.records().len()
        );

        let next = if !has_next {
            SessionState::Done
        } else if session.is_full() {
            session.truncated = true;
            SessionState::Done
        } else if session.pages_visited >= self.max_pages {
            tracing::warn!(
                "Session {}: stopping after {} pages with more available",
                session.id(),
                session.pages_visited
            );
            session.truncated = true;
            SessionState::Done
        } else {
            if added == 0 {
                tracing::warn!(
                    "Session {}: page {} added nothing new ({} unparseable rows)",
                    session.id(),
                    session.page_index() + 1,
                    page.skipped_rows
                );
            }
            SessionState::NextPage
        };
        session.transition(next);
        Ok(())
    }

    async fn advance<C>(&self, ctx: &C, session: &mut SearchSession) -> Result<()>
    where
        C: BrowserActions + ?Sized,
    {
        let target = session.page_index() + 1;
        self.retry
            .run("Page advance", &mut session.attempt_count, |_| {
                self.form.advance(ctx, target)
            })
            .await
            .map_err(|failure| give_up(failure, session.attempt_count))?;
        session.next_page();
        session.transition(SessionState::Submitted);
        Ok(())
    }

    /// Read and parse the current page, re-reading on ambiguous content.
    async fn read_page<C>(&self, ctx: &C, session: &mut SearchSession) -> Result<PageParseResult>
    where
        C: BrowserActions + ?Sized,
    {
        let parser = self.parser(session.mode());
        self.retry
            .run("Page parse", &mut session.attempt_count, |_| async move {
                let html = ctx
                    .page_content()
                    .await
                    .map_err(|e| SearchError::PortalUnreachable {
                        reason: e.to_string(),
                    })?;
                parser.parse(&html)
            })
            .await
            .map_err(|failure| give_up(failure, session.attempt_count))
    }
}

fn give_up(failure: RetryFailure, attempts: u32) -> SearchError {
    match failure {
        RetryFailure::Fatal(e) => e,
        RetryFailure::Exhausted(e) => SearchError::ConnectionError {
            attempts,
            reason: e.to_string(),
            partial: Vec::new(),
        },
    }
}
