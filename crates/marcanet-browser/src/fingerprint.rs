use rand::Rng;

/// Fingerprint presented to the portal.
///
/// The portal serves a Mexican audience, so locale and timezone are fixed to
/// match; only the user agent varies between contexts.
#[derive(Debug, Clone)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timezone: String,
}

impl FingerprintConfig {
    /// Generate a randomized fingerprint configuration
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();

        // Common desktop user agents
        let user_agents = [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        ];

        let ua_idx = rng.gen_range(0..user_agents.len());

        Self {
            user_agent: user_agents[ua_idx].to_string(),
            accept_language: "es-MX,es;q=0.9,en;q=0.8".to_string(),
            timezone: "America/Mexico_City".to_string(),
        }
    }

    /// Primary locale, e.g. `es-MX`.
    pub fn locale(&self) -> &str {
        self.accept_language
            .split(',')
            .next()
            .unwrap_or("es-MX")
            .trim()
    }
}
