//! Driving the portal's search forms.

use crate::error::{Result, SearchError};
use marcanet_browser::{BrowserActions, BrowserError};
use marcanet_core::{PortalConfig, QueryRequest, SearchMode};
use std::time::Duration;

/// How long to wait for a form once the page itself has rendered.
const FORM_TIMEOUT_MS: u64 = 3_000;

/// Poll interval while waiting for the page to change after a click.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Outcome of a form submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormSubmitOutcome {
    /// The first results page is loaded
    ResultsReady,
    /// The portal showed its empty-result marker
    NoResults,
}

/// Fills and submits the portal's search forms through a browser context.
#[derive(Debug, Clone)]
pub struct PortalFormClient {
    portal: PortalConfig,
    element_timeout_ms: u64,
}

impl PortalFormClient {
    /// Create a client for the given portal layout.
    #[must_use]
    pub fn new(portal: PortalConfig, element_timeout_ms: u64) -> Self {
        Self {
            portal,
            element_timeout_ms,
        }
    }

    /// Portal layout this client drives.
    #[must_use]
    pub fn portal(&self) -> &PortalConfig {
        &self.portal
    }

    /// Open the mode's entry page, fill in the request and submit it.
    pub async fn submit<C>(&self, ctx: &C, request: &QueryRequest) -> Result<FormSubmitOutcome>
    where
        C: BrowserActions + ?Sized,
    {
        let mode = request.mode();
        let form = self.portal.form(mode);
        let url = self
            .portal
            .entry_url(mode)
            .map_err(|e| SearchError::InvalidQuery(e.to_string()))?;

        ctx.navigate(&url).await.map_err(portal_unreachable)?;
        ctx.wait_for_selector(&self.portal.results.page_ready, self.element_timeout_ms)
            .await
            .map_err(portal_unreachable)?;

        ctx.wait_for_selector(&form.form, FORM_TIMEOUT_MS)
            .await
            .map_err(|e| match e {
                BrowserError::Timeout(_) => SearchError::FormNotFound {
                    selector: form.form.clone(),
                },
                other => portal_unreachable(other),
            })?;

        ctx.fill_field(&form.mark_input, request.mark().as_str())
            .await
            .map_err(|e| classify(e, &form.mark_input))?;

        if let (Some(class_input), Some(class)) = (&form.class_input, request.nice_class()) {
            ctx.fill_field(class_input, &class.to_string())
                .await
                .map_err(|e| classify(e, class_input))?;
        }

        // Markup already in the results region before the click is stale
        let region = self.results_region(mode);
        let before = ctx
            .extract_all_text(&region)
            .await
            .map_err(portal_unreachable)?;

        ctx.click(&form.submit_button)
            .await
            .map_err(|e| classify(e, &form.submit_button))?;

        tracing::debug!("Submitted {} form for {}", mode, request.mark());

        if before.is_empty() {
            self.wait_for_results(ctx, mode).await?;
        } else {
            self.wait_for_refresh(ctx, &region, &before).await?;
        }

        let empty = ctx
            .extract_all_text(&self.portal.results.empty_marker)
            .await
            .map_err(portal_unreachable)?;
        if empty.is_empty() {
            Ok(FormSubmitOutcome::ResultsReady)
        } else {
            Ok(FormSubmitOutcome::NoResults)
        }
    }

    /// Selector matching the results table body or the empty marker.
    fn results_region(&self, mode: SearchMode) -> String {
        format!(
            "{}, {}, {}",
            self.portal.form(mode).results_body,
            self.portal.results.results_body_fallback,
            self.portal.results.empty_marker
        )
    }

    /// Confirm the results region (or the empty marker) is on the page.
    pub async fn wait_for_results<C>(&self, ctx: &C, mode: SearchMode) -> Result<()>
    where
        C: BrowserActions + ?Sized,
    {
        let selector = self.results_region(mode);
        ctx.wait_for_selector(&selector, self.element_timeout_ms)
            .await
            .map_err(|e| SearchError::PortalUnreachable {
                reason: format!("results never appeared: {e}"),
            })
    }

    /// Wait for the results region to differ from `before`.
    ///
    /// A response identical to the old markup is indistinguishable from no
    /// response, so once the element timeout passes the current content is
    /// accepted as is.
    async fn wait_for_refresh<C>(&self, ctx: &C, region: &str, before: &[String]) -> Result<()>
    where
        C: BrowserActions + ?Sized,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.element_timeout_ms);
        loop {
            let now = ctx
                .extract_all_text(region)
                .await
                .map_err(portal_unreachable)?;
            if !now.is_empty() && now != before {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                if now.is_empty() {
                    return Err(SearchError::PortalUnreachable {
                        reason: "results region disappeared after submit".to_string(),
                    });
                }
                tracing::debug!("Results region unchanged after submit; keeping it");
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Move the results table to `page_index` (zero-based) via the paginator.
    ///
    /// Safe to call again after a failure: when the paginator already shows
    /// the requested page nothing is clicked.
    pub async fn advance<C>(&self, ctx: &C, page_index: usize) -> Result<()>
    where
        C: BrowserActions + ?Sized,
    {
        let results = &self.portal.results;
        let target = (page_index + 1).to_string();

        if self.active_page(ctx).await?.as_deref() == Some(target.as_str()) {
            return Ok(());
        }

        ctx.click(&results.paginator_next)
            .await
            .map_err(|e| classify(e, &results.paginator_next))?;

        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.element_timeout_ms);
        loop {
            if self.active_page(ctx).await?.as_deref() == Some(target.as_str()) {
                tracing::debug!("Paginator at page {}", target);
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SearchError::PortalUnreachable {
                    reason: format!("paginator did not reach page {target}"),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn active_page<C>(&self, ctx: &C) -> Result<Option<String>>
    where
        C: BrowserActions + ?Sized,
    {
        let texts = ctx
            .extract_all_text(&self.portal.results.paginator_active_page)
            .await
            .map_err(portal_unreachable)?;
        Ok(texts.into_iter().next().map(|t| t.trim().to_string()))
    }
}

fn portal_unreachable(err: BrowserError) -> SearchError {
    SearchError::PortalUnreachable {
        reason: err.to_string(),
    }
}

/// Missing elements are markup drift; everything else is connectivity.
fn classify(err: BrowserError, selector: &str) -> SearchError {
    if err.is_connectivity() {
        portal_unreachable(err)
    } else {
        SearchError::FormNotFound {
            selector: selector.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_browser_errors() {
        let missing = classify(BrowserError::SelectorNotFound("#x".to_string()), "#x");
        assert!(matches!(missing, SearchError::FormNotFound { .. }));

        let timeout = classify(BrowserError::Timeout("slow".to_string()), "#x");
        assert!(matches!(timeout, SearchError::PortalUnreachable { .. }));
        assert!(timeout.is_transient());
    }
}
