//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the identifying user agent string
//! - Resolving landing and listing URLs against the configured base
//! - Mapping transport and status failures onto [`FetchError`]

use crate::config::{Config, UserAgentConfig};
use crate::record::YearToken;
use crate::url::{landing_url, listing_url};
use crate::{FetchError, FetchResult, HarvestError};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout_secs` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use accident_harvest::config::UserAgentConfig;
/// use accident_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "AccidentHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, 30).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Registry client bound to a base URL
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct SiteClient {
    client: Client,
    base: Url,
}

impl SiteClient {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Builds the client from the `[source]`, `[crawler]` and `[user-agent]` sections
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let base = Url::parse(&config.source.base_url)?;
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout_secs)?;
        Ok(Self::new(client, base))
    }

    /// Fetches the landing page, returning its URL alongside the body
    pub async fn fetch_landing(&self) -> FetchResult<(Url, String)> {
        let url = landing_url(&self.base)?;
        let body = self.fetch_html(&url).await?;
        Ok((url, body))
    }

    /// Fetches one listing page of a year
    pub async fn fetch_listing(&self, year: &YearToken, page: u32) -> FetchResult<String> {
        let url = listing_url(&self.base, year, page)?;
        self.fetch_html(&url).await
    }

    /// Fetches a URL and returns its body
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | 2xx | `Ok(body)` |
    /// | Other status | `FetchError::Status` |
    /// | Timeout | `FetchError::Timeout` |
    /// | Connect/other transport error | `FetchError::Transport` |
    /// | Body read failure | `FetchError::Body` |
    pub async fn fetch_html(&self, url: &Url) -> FetchResult<String> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }
}

fn classify(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: error,
        }
    }
}
