use crate::error::{BrowserError, Result};

/// The automation capability the search engine is written against.
///
/// One implementor value is one browser context. Methods take `&self` but a
/// context must only ever be driven by a single session at a time.
#[async_trait::async_trait]
pub trait BrowserActions: Send + Sync {
    /// Navigate to a URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait for a selector to appear
    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Fill a form field by selector, replacing its current value
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()>;

    /// Click an element by selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Submit the form matched by selector
    async fn submit_form(&self, selector: &str) -> Result<()>;

    /// Extract text from the first element matching selector
    async fn extract_text(&self, selector: &str) -> Result<String>;

    /// Extract text from every element matching selector; empty when none match
    async fn extract_all_text(&self, selector: &str) -> Result<Vec<String>>;

    /// Serialized HTML of the current document
    async fn page_content(&self) -> Result<String>;

    /// Release the browser behind this context
    async fn close(&self) -> Result<()>;
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(|s| s.to_string())
}

/// Quote a CSS selector as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
