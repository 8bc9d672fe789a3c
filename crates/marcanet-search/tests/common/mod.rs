//! In-memory stand-in for the Marcanet portal.
//!
//! Renders the same PrimeFaces markup the real portal serves (forms, results
//! table, paginator) and answers `BrowserActions` calls against it, so the
//! whole search stack runs without a browser.

#![allow(dead_code)]

use marcanet_browser::{BrowserActions, BrowserError, ContextFactory, Result};
use scraper::{Html, Selector};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const ROWS_PER_ENDLESS_PAGE: usize = 15;

const MAINTENANCE_PAGE: &str =
    "<html><body><h1>Sitio en mantenimiento</h1><p>Intente más tarde.</p></body></html>";

/// One results row.
#[derive(Debug, Clone)]
pub struct Row {
    pub registration: String,
    pub file: String,
    pub mark: String,
    pub class: String,
}

impl Row {
    pub fn numbered(n: usize) -> Self {
        Self {
            registration: format!("{}", 1_000_000 + n),
            file: format!("{}", 2_000_000 + n),
            mark: format!("LUNA {n}"),
            class: "30".to_string(),
        }
    }

    pub fn malformed() -> Self {
        Self {
            registration: String::new(),
            file: String::new(),
            mark: "SIN EXPEDIENTE".to_string(),
            class: "30".to_string(),
        }
    }
}

/// How the portal pages its results.
#[derive(Debug, Clone)]
pub enum Pages {
    /// Fixed pages; the last one disables the "next" control
    Fixed(Vec<Vec<Row>>),
    /// Fresh rows on every page and never a last page
    Endless,
    /// The same rows on every page and never a last page
    Repeating(Vec<Row>),
    /// The empty-result marker
    NoResults,
}

impl Pages {
    /// `pages` pages of `per_page` consecutively numbered rows.
    pub fn numbered(pages: usize, per_page: usize) -> Self {
        Self::Fixed(
            (0..pages)
                .map(|p| (0..per_page).map(|i| Row::numbered(p * per_page + i)).collect())
                .collect(),
        )
    }

    fn rows(&self, page: usize) -> Vec<Row> {
        match self {
            Self::Fixed(pages) => pages.get(page).cloned().unwrap_or_default(),
            Self::Endless => (0..ROWS_PER_ENDLESS_PAGE)
                .map(|i| Row::numbered(page * ROWS_PER_ENDLESS_PAGE + i))
                .collect(),
            Self::Repeating(rows) => rows.clone(),
            Self::NoResults => Vec::new(),
        }
    }

    fn is_last(&self, page: usize) -> bool {
        match self {
            Self::Fixed(pages) => page + 1 >= pages.len(),
            Self::Endless | Self::Repeating(_) => false,
            Self::NoResults => true,
        }
    }
}

/// What one `page_content` call hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// The rendered page
    Real,
    /// An empty document
    Blank,
    /// A page with content but no results table
    Maintenance,
}

/// Behaviour and counters shared by every context of one stub portal.
#[derive(Debug)]
pub struct StubPortal {
    pages: Pages,
    fail_navigations: usize,
    page_delay: Duration,
    results_delay: Duration,
    form_missing: bool,
    prerendered_empty: bool,
    served: Mutex<VecDeque<Served>>,
    pub navigations: AtomicUsize,
    pub launched: AtomicUsize,
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub filled: Mutex<HashMap<String, String>>,
}

impl StubPortal {
    pub fn new(pages: Pages) -> Self {
        Self {
            pages,
            fail_navigations: 0,
            page_delay: Duration::ZERO,
            results_delay: Duration::ZERO,
            form_missing: false,
            prerendered_empty: false,
            served: Mutex::new(VecDeque::new()),
            navigations: AtomicUsize::new(0),
            launched: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            max_live: AtomicUsize::new(0),
            filled: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the first `count` navigations across all contexts.
    pub fn failing_navigations(mut self, count: usize) -> Self {
        self.fail_navigations = count;
        self
    }

    /// Take `delay` to hand over each results page.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Show results only `delay` after the search button is clicked.
    pub fn with_results_delay(mut self, delay: Duration) -> Self {
        self.results_delay = delay;
        self
    }

    /// Render pages without any search form.
    pub fn without_form(mut self) -> Self {
        self.form_missing = true;
        self
    }

    /// Show an empty results table before any search is submitted.
    pub fn with_prerendered_empty_table(mut self) -> Self {
        self.prerendered_empty = true;
        self
    }

    /// Answer the first `page_content` calls with `served`, in order.
    pub fn serving(self, served: Vec<Served>) -> Self {
        *self.served.lock().unwrap() = served.into();
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn filled(&self, selector: &str) -> Option<String> {
        self.filled.lock().unwrap().get(selector).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Blank,
    Denomination,
    Phonetic,
}

#[derive(Debug)]
struct ContextState {
    screen: Screen,
    submitted: bool,
    submitted_at: Option<Instant>,
    page: usize,
}

/// One simulated browser context.
pub struct StubContext {
    portal: Arc<StubPortal>,
    state: Mutex<ContextState>,
    closed: AtomicBool,
}

impl StubContext {
    fn render(&self) -> String {
        let state = self.state.lock().unwrap();
        if self.portal.form_missing && state.screen != Screen::Blank {
            return MAINTENANCE_PAGE.to_string();
        }
        let (form_id, mark_id, class_input, button_id) = match state.screen {
            Screen::Blank => return "<html><body></body></html>".to_string(),
            Screen::Denomination => ("frmBsqDen", "denominacionId", "", "busquedaIdButton"),
            Screen::Phonetic => (
                "frmBsqFonetica",
                "denominacion",
                r#"<input id="frmBsqFonetica:clases" type="text"/>"#,
                "busquedaId2",
            ),
        };

        let arrived = state
            .submitted_at
            .is_some_and(|at| at.elapsed() >= self.portal.results_delay);
        let results = if state.submitted && arrived {
            render_results(form_id, &self.portal.pages, state.page)
        } else if self.portal.prerendered_empty {
            render_empty(form_id)
        } else {
            String::new()
        };

        format!(
            r#"<html><body>
            <form id="{form_id}">
              <input id="{form_id}:{mark_id}" type="text"/>
              {class_input}
              <button id="{form_id}:{button_id}" type="submit">Buscar</button>
              {results}
            </form>
            </body></html>"#
        )
    }

    fn select_texts(&self, selector: &str) -> Result<Vec<String>> {
        let selector = Selector::parse(selector)
            .map_err(|e| BrowserError::SelectorNotFound(format!("{selector}: {e}")))?;
        let document = Html::parse_document(&self.render());
        Ok(document
            .select(&selector)
            .map(|e| e.text().collect::<String>().trim().to_string())
            .collect())
    }

    fn require(&self, selector: &str) -> Result<()> {
        if self.select_texts(selector)?.is_empty() {
            Err(BrowserError::SelectorNotFound(selector.to_string()))
        } else {
            Ok(())
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }
}

fn render_empty(form_id: &str) -> String {
    format!(
        r#"<table><tbody id="{form_id}:resultadoExpediente_data" class="ui-datatable-data">
           <tr class="ui-widget-content ui-datatable-empty-message"><td colspan="8">No se encontraron registros.</td></tr>
           </tbody></table>"#
    )
}

fn render_results(form_id: &str, pages: &Pages, page: usize) -> String {
    let body_id = format!("{form_id}:resultadoExpediente_data");
    if matches!(pages, Pages::NoResults) {
        return render_empty(form_id);
    }

    let rows: String = pages
        .rows(page)
        .iter()
        .enumerate()
        .map(|(i, row)| {
            format!(
                r##"<tr data-ri="{i}"><td>{n}</td><td>M</td><td></td><td>TITULAR {n}</td>
                   <td>{file}</td><td>{registration}</td><td><a href="#">{mark}</a></td><td>{class}</td></tr>"##,
                n = i + 1,
                file = row.file,
                registration = row.registration,
                mark = row.mark,
                class = row.class,
            )
        })
        .collect();

    let disabled = if pages.is_last(page) {
        " ui-state-disabled"
    } else {
        ""
    };

    format!(
        r#"<table><tbody id="{body_id}" class="ui-datatable-data">{rows}</tbody></table>
           <div class="ui-paginator">
             <span class="ui-paginator-page ui-state-active">{active}</span>
             <a class="ui-paginator-next{disabled}">&gt;</a>
           </div>"#,
        active = page + 1
    )
}

#[async_trait::async_trait]
impl BrowserActions for StubContext {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        let n = self.portal.navigations.fetch_add(1, Ordering::SeqCst);
        if n < self.portal.fail_navigations {
            return Err(BrowserError::NavigationError(format!(
                "{url}: connection reset"
            )));
        }

        let mut state = self.state.lock().unwrap();
        state.screen = if url.contains("bsqFonetica") {
            Screen::Phonetic
        } else {
            Screen::Denomination
        };
        state.submitted = false;
        state.submitted_at = None;
        state.page = 0;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        self.ensure_open()?;
        if self.select_texts(selector)?.is_empty() {
            Err(BrowserError::Timeout(format!(
                "{selector} not present after {timeout_ms}ms"
            )))
        } else {
            Ok(())
        }
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        self.require(selector)?;
        self.portal
            .filled
            .lock()
            .unwrap()
            .insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.ensure_open()?;
        self.require(selector)?;
        let mut state = self.state.lock().unwrap();
        if selector.contains("busquedaId") {
            state.submitted = true;
            state.submitted_at = Some(Instant::now());
            state.page = 0;
        } else if selector.contains("paginator-next") && !self.portal.pages.is_last(state.page) {
            state.page += 1;
        }
        Ok(())
    }

    async fn submit_form(&self, selector: &str) -> Result<()> {
        self.ensure_open()?;
        self.require(selector)?;
        let mut state = self.state.lock().unwrap();
        state.submitted = true;
        state.submitted_at = Some(Instant::now());
        Ok(())
    }

    async fn extract_text(&self, selector: &str) -> Result<String> {
        self.ensure_open()?;
        self.select_texts(selector)?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::SelectorNotFound(selector.to_string()))
    }

    async fn extract_all_text(&self, selector: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.select_texts(selector)
    }

    async fn page_content(&self) -> Result<String> {
        self.ensure_open()?;
        if !self.portal.page_delay.is_zero() {
            tokio::time::sleep(self.portal.page_delay).await;
        }
        let served = self.portal.served.lock().unwrap().pop_front();
        Ok(match served.unwrap_or(Served::Real) {
            Served::Real => self.render(),
            Served::Blank => String::new(),
            Served::Maintenance => MAINTENANCE_PAGE.to_string(),
        })
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.portal.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Launches stub contexts, tracking how many are alive.
pub struct StubFactory {
    pub portal: Arc<StubPortal>,
}

impl StubFactory {
    pub fn new(portal: Arc<StubPortal>) -> Self {
        Self { portal }
    }
}

#[async_trait::async_trait]
impl ContextFactory for StubFactory {
    type Context = StubContext;

    async fn launch(&self) -> Result<StubContext> {
        self.portal.launched.fetch_add(1, Ordering::SeqCst);
        let live = self.portal.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.portal.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(StubContext {
            portal: Arc::clone(&self.portal),
            state: Mutex::new(ContextState {
                screen: Screen::Blank,
                submitted: false,
                submitted_at: None,
                page: 0,
            }),
            closed: AtomicBool::new(false),
        })
    }
}
