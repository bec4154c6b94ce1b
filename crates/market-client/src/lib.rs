use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use theme_core::{CandidateSource, StockSnapshot, ThemeTaxonomy};

pub mod collectors;
mod error;
mod pacing;
pub mod wire;

pub use error::ClientError;
use pacing::RequestPacer;
use wire::{QuoteItem, SearchResponse};

/// Tries per request while the gateway answers 429
const THROTTLE_ATTEMPTS: u32 = 3;

/// HTTP client for the market-data gateway.
///
/// Implements every collector trait plus `QuoteProvider` and
/// `InvestorFlowProvider` (see `collectors`). Failures are logged and
/// surface as `None` or empty lists.
#[derive(Clone)]
pub struct MarketDataClient {
    base_url: String,
    client: Client,
    pacer: Arc<RequestPacer>,
    taxonomy: Arc<ThemeTaxonomy>,
    /// Display name → instrument code, resolved once per process
    code_cache: Arc<DashMap<String, String>>,
    throttle_backoff: Duration,
    /// Pause between sector chunks and between article-body fetches
    batch_delay: Duration,
}

impl MarketDataClient {
    pub fn new(base_url: impl Into<String>, rate_limit_per_min: usize, taxonomy: Arc<ThemeTaxonomy>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            pacer: Arc::new(RequestPacer::per_minute(rate_limit_per_min)),
            taxonomy,
            code_cache: Arc::new(DashMap::new()),
            throttle_backoff: Duration::from_secs(15),
            batch_delay: Duration::from_millis(500),
        }
    }

    /// Wait between 429 retries (tests shorten it)
    pub fn with_throttle_backoff(mut self, backoff: Duration) -> Self {
        self.throttle_backoff = backoff;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub(crate) fn batch_delay(&self) -> Duration {
        self.batch_delay
    }

    pub fn taxonomy(&self) -> &ThemeTaxonomy {
        &self.taxonomy
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET a gateway path within the quota, backing off while it answers 429.
    async fn dispatch(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        let mut attempt = 1;

        loop {
            self.pacer.wait_turn().await;
            let response = self.client.get(&url).query(query).send().await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }
            if attempt >= THROTTLE_ATTEMPTS {
                return Err(ClientError::Throttled {
                    path: path.to_string(),
                    attempts: attempt,
                });
            }

            tracing::warn!(
                "Gateway throttled {} ({}/{}), backing off {}ms",
                path,
                attempt,
                THROTTLE_ATTEMPTS,
                self.throttle_backoff.as_millis()
            );
            tokio::time::sleep(self.throttle_backoff).await;
            attempt += 1;
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ClientError> {
        let response = self.dispatch(path, query).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
            path: path.to_string(),
            source,
        })
    }

    fn is_code(key: &str) -> bool {
        key.len() == 6 && key.chars().all(|c| c.is_ascii_alphanumeric()) && key.chars().any(|c| c.is_ascii_digit())
    }

    /// Resolve a display name to its instrument code, caching hits.
    pub async fn resolve_code(&self, key: &str) -> Result<Option<String>, ClientError> {
        if Self::is_code(key) {
            return Ok(Some(key.to_string()));
        }
        if let Some(code) = self.code_cache.get(key) {
            return Ok(Some(code.clone()));
        }

        let found: SearchResponse = self.get_json("/api/search", &[("q", key.to_string())]).await?;
        let code = found
            .items
            .into_iter()
            .find(|item| item.name == key)
            .map(|item| item.code);

        if let Some(code) = &code {
            self.code_cache.insert(key.to_string(), code.clone());
        }
        Ok(code)
    }

    pub fn cached_codes(&self) -> usize {
        self.code_cache.len()
    }

    /// Quote by code or name.
    pub async fn fetch_quote(&self, key: &str) -> Result<Option<StockSnapshot>, ClientError> {
        let Some(code) = self.resolve_code(key).await? else {
            tracing::debug!("No instrument code found for {}", key);
            return Ok(None);
        };

        let item: QuoteItem = self.get_json(&format!("/api/stock/{}/basic", code), &[]).await?;
        let mut stock = item.into_snapshot(CandidateSource::Quote, Utc::now());
        if stock.code.is_none() {
            stock.code = Some(code.clone());
        }
        if !Self::is_code(key) && stock.name != key {
            self.code_cache.insert(stock.name.clone(), code);
        }
        Ok(Some(stock))
    }
}
