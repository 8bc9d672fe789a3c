use crate::actions::{extract_domain, js_string, BrowserActions};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::pool::ContextFactory;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use marcanet_core::BrowserConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Poll interval while waiting for an element.
const SELECTOR_POLL: Duration = Duration::from_millis(100);

/// Minimum spacing between navigations to the same domain.
///
/// Unlike a hard rate limit this never fails a request; it hands back how
/// long the caller should sleep before going ahead.
#[derive(Debug)]
struct PolitenessDelay {
    next_allowed: HashMap<String, Instant>,
    min_delay: Duration,
}

impl PolitenessDelay {
    fn new(min_delay_ms: u64) -> Self {
        Self {
            next_allowed: HashMap::new(),
            min_delay: Duration::from_millis(min_delay_ms),
        }
    }

    /// Reserve the next slot for `domain` and return how long to wait for it.
    fn reserve(&mut self, domain: &str) -> Duration {
        let now = Instant::now();
        let slot = match self.next_allowed.get(domain) {
            Some(next) if *next > now => *next,
            _ => now,
        };
        self.next_allowed
            .insert(domain.to_string(), slot + self.min_delay);
        slot - now
    }
}

/// One headless Chromium instance with a single tab.
///
/// This is the production browser context: the pool launches one per slot
/// and the search engine drives it through [`BrowserActions`].
pub struct BrowserEngine {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    fingerprint: FingerprintConfig,
    politeness: Mutex<PolitenessDelay>,
    navigation_timeout: Duration,
    closed: AtomicBool,
}

impl BrowserEngine {
    /// Launch a browser with default settings and a random fingerprint
    pub async fn new() -> Result<Self> {
        Self::launch(&BrowserConfig::default(), FingerprintConfig::randomized()).await
    }

    /// Launch a browser from configuration with a specific fingerprint
    pub async fn launch(config: &BrowserConfig, fingerprint: FingerprintConfig) -> Result<Self> {
        let mut builder = CdpBrowserConfig::builder()
            .no_sandbox()
            .window_size(config.window_width, config.window_height)
            .request_timeout(Duration::from_secs(config.navigation_timeout_secs))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", fingerprint.user_agent))
            .arg(format!("--lang={}", fingerprint.locale()));
        if !config.headless {
            builder = builder.with_head();
        }
        let cdp_config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(cdp_config).await?;

        // The handler drives the CDP connection and must be polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(e.into());
            }
        };

        if let Err(e) = page
            .execute(SetTimezoneOverrideParams::new(fingerprint.timezone.clone()))
            .await
        {
            tracing::warn!("Could not override timezone: {}", e);
        }

        tracing::debug!("Launched browser context ({})", fingerprint.user_agent);

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            fingerprint,
            politeness: Mutex::new(PolitenessDelay::new(config.min_request_delay_ms)),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            closed: AtomicBool::new(false),
        })
    }

    /// Fingerprint this context presents.
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }

    async fn evaluate_js(&self, script: String) -> Result<()> {
        self.page
            .evaluate(script)
            .await
            .map(|_| ())
            .map_err(BrowserError::from)
    }
}

#[async_trait::async_trait]
impl BrowserActions for BrowserEngine {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        let domain = extract_domain(url)?;

        let wait = self.politeness.lock().await.reserve(&domain);
        if !wait.is_zero() {
            tracing::debug!("Waiting {:?} before navigating to {}", wait, domain);
            tokio::time::sleep(wait).await;
        }

        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::NavigationError(format!("{url}: {e}"))),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {url} exceeded {:?}",
                self.navigation_timeout
            ))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        self.ensure_open()?;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "{selector} did not appear within {timeout_ms}ms"
                )));
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;

        self.evaluate_js(format!(
            "document.querySelector({}).value = ''",
            js_string(selector)
        ))
        .await?;
        element.click().await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.ensure_open()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn submit_form(&self, selector: &str) -> Result<()> {
        self.ensure_open()?;
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        self.evaluate_js(format!(
            "document.querySelector({}).requestSubmit()",
            js_string(selector)
        ))
        .await
    }

    async fn extract_text(&self, selector: &str) -> Result<String> {
        self.ensure_open()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        Ok(element
            .inner_text()
            .await?
            .map(|t| t.trim().to_string())
            .unwrap_or_default())
    }

    async fn extract_all_text(&self, selector: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let Ok(elements) = self.page.find_elements(selector).await else {
            return Ok(Vec::new());
        };
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            texts.push(
                element
                    .inner_text()
                    .await?
                    .map(|t| t.trim().to_string())
                    .unwrap_or_default(),
            );
        }
        Ok(texts)
    }

    async fn page_content(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.page.content().await?)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Err(e) = self.page.clone().close().await {
            tracing::debug!("Closing page failed: {}", e);
        }

        let mut browser = self.browser.lock().await;
        let result = match browser.close().await {
            Ok(_) => {
                if let Err(e) = browser.wait().await {
                    tracing::debug!("Waiting for browser exit failed: {}", e);
                }
                Ok(())
            }
            Err(e) => Err(BrowserError::from(e)),
        };
        self.handler.abort();
        tracing::debug!("Browser context closed");
        result
    }
}

/// Launches [`BrowserEngine`]s for the context pool.
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    config: BrowserConfig,
}

impl ChromiumFactory {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl ContextFactory for ChromiumFactory {
    type Context = BrowserEngine;

    async fn launch(&self) -> Result<BrowserEngine> {
        BrowserEngine::launch(&self.config, FingerprintConfig::randomized()).await
    }
}
