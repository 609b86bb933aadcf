use std::thread;
use std::time::Duration;

use memegen_contracts::templates::{CategoryLists, TemplateInfo};
use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::catalog::CatalogSource;
use crate::config::ClientConfig;
use crate::error::{MemeError, Result};

/// Retrying client for the read-only metadata and preview endpoints.
/// Generation uploads never go through here.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: HttpClient,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            config,
            http: HttpClient::builder().build()?,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn categories(&self) -> Result<CategoryLists> {
        self.get_json("/memes/categories")
    }

    pub fn template_info(&self, key: &str) -> Result<TemplateInfo> {
        self.get_json(&format!("/memes/{key}/info"))
    }

    pub fn template_preview(&self, key: &str) -> Result<Vec<u8>> {
        self.get_bytes(&format!("/memes/{key}/preview"))
    }

    pub fn template_keys(&self) -> Result<Vec<String>> {
        self.get_json("/memes/keys")
    }

    pub fn server_version(&self) -> Result<String> {
        self.get_json("/meme/version")
    }

    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.config.url(path);
        self.with_retries(&url, || {
            let response = self
                .http
                .get(&url)
                .timeout(self.config.metadata_timeout)
                .send()?;
            let code = response.status().as_u16();
            if code != 200 {
                return Err(MemeError::ApiStatus(code));
            }
            let body = response.text()?;
            parse_json_body(&body)
        })
    }

    pub fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.config.url(path);
        self.with_retries(&url, || {
            let response = self
                .http
                .get(&url)
                .timeout(self.config.preview_timeout)
                .send()?;
            let code = response.status().as_u16();
            if code != 200 {
                return Err(MemeError::ApiStatus(code));
            }
            Ok(response.bytes()?.to_vec())
        })
    }

    /// Up to `retries` attempts with a linear `backoff * attempt` pause
    /// between them.
    fn with_retries<T>(&self, url: &str, mut attempt_once: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.config.retries.max(1);
        let mut attempt = 1;
        loop {
            debug!("GET {url} (attempt {attempt}/{attempts})");
            match attempt_once() {
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!("retrying {url} after attempt {attempt}/{attempts} failed: {err}");
                    thread::sleep(backoff_for(self.config.retry_backoff, attempt));
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}

impl CatalogSource for ApiClient {
    fn categories(&self) -> Result<CategoryLists> {
        ApiClient::categories(self)
    }

    fn template_info(&self, key: &str) -> Result<TemplateInfo> {
        ApiClient::template_info(self, key)
    }

    fn template_preview(&self, key: &str) -> Result<Vec<u8>> {
        ApiClient::template_preview(self, key)
    }
}

fn backoff_for(base: Duration, attempt: usize) -> Duration {
    base.saturating_mul(attempt as u32)
}

fn parse_json_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    let text = body.trim();
    if text.starts_with("<!DOCTYPE") || text.starts_with("<html") {
        return Err(MemeError::InvalidPayload(
            "server returned an HTML page; check the API base URL".to_string(),
        ));
    }
    serde_json::from_str(text)
        .map_err(|err| MemeError::InvalidPayload(format!("response is not valid JSON: {err}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{backoff_for, ApiClient};
    use crate::config::ClientConfig;
    use crate::error::MemeError;
    use crate::test_support::{CannedResponse, TestServer};

    fn client_for(server: &TestServer) -> anyhow::Result<ApiClient> {
        let mut config = ClientConfig::default().with_api_base(server.base());
        config.retry_backoff = Duration::from_millis(1);
        Ok(ApiClient::new(config)?)
    }

    #[test]
    fn backoff_grows_linearly() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_for(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_for(base, 2), Duration::from_secs(2));
    }

    #[test]
    fn categories_decode_from_json() -> anyhow::Result<()> {
        let server = TestServer::start(vec![CannedResponse::json(json!({
            "all": ["a", "b"],
            "text_only": ["a"],
            "image_only": ["b"],
            "mixed": []
        }))])?;
        let client = client_for(&server)?;
        let lists = client.categories()?;
        assert_eq!(lists.all, vec!["a", "b"]);
        assert_eq!(lists.text_only, vec!["a"]);

        let requests = server.finish();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/memes/categories");
        Ok(())
    }

    #[test]
    fn server_errors_are_retried_until_success() -> anyhow::Result<()> {
        let server = TestServer::start(vec![
            CannedResponse::new(500, Some("text/plain"), "boom"),
            CannedResponse::new(503, Some("text/plain"), "busy"),
            CannedResponse::json(json!({"key": "drake", "params_type": {"min_texts": 2, "max_texts": 2}})),
        ])?;
        let client = client_for(&server)?;
        let info = client.template_info("drake")?;
        assert_eq!(info.key, "drake");
        assert_eq!(server.finish().len(), 3);
        Ok(())
    }

    #[test]
    fn server_errors_give_up_after_three_attempts() -> anyhow::Result<()> {
        let server = TestServer::start(vec![
            CannedResponse::new(500, None, ""),
            CannedResponse::new(500, None, ""),
            CannedResponse::new(502, None, ""),
        ])?;
        let client = client_for(&server)?;
        let err = client.template_preview("drake").err();
        assert!(matches!(err, Some(MemeError::ApiStatus(502))));
        assert_eq!(server.finish().len(), 3);
        Ok(())
    }

    #[test]
    fn client_errors_are_not_retried() -> anyhow::Result<()> {
        let server = TestServer::start(vec![CannedResponse::new(404, None, "missing")])?;
        let client = client_for(&server)?;
        let err = client.template_info("nope").err();
        assert!(matches!(err, Some(MemeError::ApiStatus(404))));
        assert_eq!(server.finish().len(), 1);
        Ok(())
    }

    #[test]
    fn html_bodies_are_rejected() -> anyhow::Result<()> {
        let server = TestServer::start(vec![CannedResponse::new(
            200,
            Some("text/html"),
            "<!DOCTYPE html><html></html>",
        )])?;
        let client = client_for(&server)?;
        let err = client.categories().err();
        assert!(matches!(err, Some(MemeError::InvalidPayload(_))));
        server.finish();
        Ok(())
    }

    #[test]
    fn template_keys_and_version_decode() -> anyhow::Result<()> {
        let server = TestServer::start(vec![
            CannedResponse::json(json!(["drake", "petpet"])),
            CannedResponse::json(json!("0.1.2")),
        ])?;
        let client = client_for(&server)?;
        assert_eq!(client.template_keys()?, vec!["drake", "petpet"]);
        assert_eq!(client.server_version()?, "0.1.2");

        let requests = server.finish();
        assert_eq!(requests[0].path, "/memes/keys");
        assert_eq!(requests[1].path, "/meme/version");
        Ok(())
    }

    #[test]
    fn preview_returns_raw_bytes() -> anyhow::Result<()> {
        let server = TestServer::start(vec![CannedResponse::new(
            200,
            Some("image/png"),
            b"GIF89a".to_vec(),
        )])?;
        let client = client_for(&server)?;
        assert_eq!(client.template_preview("drake")?, b"GIF89a".to_vec());
        assert_eq!(server.finish()[0].path, "/memes/drake/preview");
        Ok(())
    }
}
