//! Upstream fuel-price provider client
//!
//! Fetches the JSON price list for a single region key from the third-party
//! provider. Only a fully read body that is served as JSON and parses as JSON
//! is returned; everything else is an [`UpstreamError`] for that key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

use super::{FuelPrices, RegionKey};

/// Default upstream endpoint for regional fuel prices
pub const DEFAULT_UPSTREAM_URL: &str = "https://www.henrikhjelm.se/api/getdata.php";

/// Default query parameter carrying the region key
pub const DEFAULT_QUERY_PARAM: &str = "lan";

/// Default timeout for a single upstream request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_USER_AGENT: &str = concat!("fuelcache/", env!("CARGO_PKG_VERSION"));

/// Maximum length of an upstream body quoted in an error message
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Errors that can occur when fetching prices for one candidate key
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection, TLS or body read failure
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The request did not complete within the configured timeout
    #[error("upstream request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("upstream returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Upstream answered successfully but not with JSON
    #[error("upstream returned non-JSON content type {content_type:?}")]
    NotJson { content_type: String },

    /// Upstream claimed JSON but the body does not parse
    #[error("upstream returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl UpstreamError {
    /// Whether upstream answered but with unusable content
    pub fn is_malformed(&self) -> bool {
        matches!(self, UpstreamError::NotJson { .. } | UpstreamError::Malformed(_))
    }

    fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            UpstreamError::Timeout(error)
        } else {
            UpstreamError::Transport(error)
        }
    }

    fn from_status(status: StatusCode, body: &[u8]) -> Self {
        UpstreamError::Status {
            status,
            body: truncate_body(body),
        }
    }
}

/// A source of fuel prices keyed by region
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetches the current prices for `key`
    async fn fetch(&self, key: &RegionKey) -> Result<FuelPrices, UpstreamError>;
}

/// Client for the upstream HTTP fuel-price API
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    client: Client,
    base_url: Url,
    query_param: String,
}

impl HttpPriceSource {
    /// Creates a client with an explicit per-request timeout
    ///
    /// # Arguments
    /// * `base_url` - Endpoint the region key is appended to as a query parameter
    /// * `query_param` - Name of the query parameter, `lan` for the default provider
    /// * `timeout` - Upper bound for connecting and reading the whole response
    ///
    /// # Errors
    /// Returns an error if the underlying reqwest client cannot be built.
    pub fn new(
        base_url: Url,
        query_param: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            query_param: query_param.into(),
        })
    }

    /// Builds the request URL for `key`
    pub fn url_for(&self, key: &RegionKey) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(&self.query_param, key.as_str());
        url
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch(&self, key: &RegionKey) -> Result<FuelPrices, UpstreamError> {
        let response = self
            .client
            .get(self.url_for(key))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(UpstreamError::from_transport)?;

        if !status.is_success() {
            return Err(UpstreamError::from_status(status, &body));
        }
        if !is_json_content_type(&content_type) {
            return Err(UpstreamError::NotJson { content_type });
        }

        Ok(FuelPrices::from_json_bytes(body.to_vec())?)
    }
}

/// Accepts `application/json` and structured `+json` media types
fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}

/// Collapses whitespace and caps the length of a body quoted in an error
fn truncate_body(body: &[u8]) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if compact.chars().count() <= MAX_ERROR_BODY_LENGTH {
        compact
    } else {
        let preview: String = compact.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", preview)
    }
}
