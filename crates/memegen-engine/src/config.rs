use std::env;
use std::time::Duration;

use memegen_contracts::templates::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:2233";

/// Endpoint, paging and timing knobs shared by the API client, the upload
/// transports and the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base: String,
    pub page_size: usize,
    pub retries: usize,
    pub retry_backoff: Duration,
    pub metadata_timeout: Duration,
    pub preview_timeout: Duration,
    pub upload_timeout: Duration,
    pub json_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            retries: 3,
            retry_backoff: Duration::from_secs(1),
            metadata_timeout: Duration::from_secs(10),
            preview_timeout: Duration::from_secs(15),
            upload_timeout: Duration::from_secs(60),
            json_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `MEME_API_BASE`, `MEME_PAGE_SIZE` and
    /// `MEME_RETRY_BACKOFF_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(api_base) = non_empty_env("MEME_API_BASE") {
            config = config.with_api_base(&api_base);
        }
        if let Some(page_size) = non_empty_env("MEME_PAGE_SIZE")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
        {
            config.page_size = page_size;
        }
        if let Some(backoff_ms) =
            non_empty_env("MEME_RETRY_BACKOFF_MS").and_then(|value| value.parse::<u64>().ok())
        {
            config.retry_backoff = Duration::from_millis(backoff_ms);
        }
        config
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    pub fn generate_url(&self, template_key: &str) -> String {
        self.url(&format!("memes/{template_key}/"))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
