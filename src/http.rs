//! Blocking HTTP client used for playlist downloads, manifests and probes

use std::time::Duration;

use tracing::debug;

use crate::config::AppConfig;
use crate::error::{Error, Result};

/// Largest playlist/asset body we are willing to buffer
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// A fetched resource and its declared content type
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    probe_agent: ureq::Agent,
    user_agent: String,
}

impl HttpClient {
    pub fn new(user_agent: &str, fetch_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            agent: build_agent(fetch_timeout),
            probe_agent: build_agent(probe_timeout),
            user_agent: user_agent.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.user_agent, config.fetch_timeout(), config.probe_timeout())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET a text document (playlist, manifest). Non-2xx answers are errors.
    pub fn get_text(&self, url: &str) -> Result<String> {
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()?;

        check_status(response.status())?;

        let content = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(|e| Error::Network(format!("Read failed: {}", e)))?;
        debug!("Fetched {} bytes from {}", content.len(), url);
        Ok(content)
    }

    /// GET any resource with its content type
    pub fn get_resource(&self, url: &str) -> Result<Resource> {
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()?;

        check_status(response.status())?;

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| Error::Network(format!("Read failed: {}", e)))?;

        Ok(Resource { body, content_type })
    }

    /// Header-only request. Any HTTP answer, including 4xx/5xx, counts as
    /// reachable; only transport failures and timeouts are errors.
    pub fn head(&self, url: &str) -> Result<u16> {
        let response = self
            .probe_agent
            .head(url)
            .header("User-Agent", &self.user_agent)
            .call()?;
        Ok(response.status().as_u16())
    }
}

fn check_status(status: ureq::http::StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Network(format!("HTTP error: {}", status)))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .new_agent()
}

/// Source of playlist text
pub trait TextFetcher {
    fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Source of arbitrary resources, used by the offline shell cache
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Resource>;
}

impl TextFetcher for HttpClient {
    fn fetch_text(&self, url: &str) -> Result<String> {
        self.get_text(url)
    }
}

impl Fetcher for HttpClient {
    fn fetch(&self, url: &str) -> Result<Resource> {
        self.get_resource(url)
    }
}
