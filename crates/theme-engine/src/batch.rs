use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use theme_core::{is_noise, QuoteProvider, StockSnapshot};

/// Concurrent fetches are issued `size` at a time with `delay` between groups
/// to stay under upstream rate limits.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub size: usize,
    pub delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 5,
            delay: Duration::from_millis(500),
        }
    }
}

pub async fn batched<'a, T, R, F, Fut>(items: &'a [T], config: &BatchConfig, fetch: F) -> Vec<R>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Option<R>>,
{
    let mut results = Vec::with_capacity(items.len());

    for (i, chunk) in items.chunks(config.size.max(1)).enumerate() {
        if i > 0 && !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }
        let fetched = join_all(chunk.iter().map(&fetch)).await;
        results.extend(fetched.into_iter().flatten());
    }

    results
}

/// Quote every key, dropping failures and non-common-stock instruments.
pub async fn fetch_quotes(
    provider: &dyn QuoteProvider,
    keys: &[String],
    config: &BatchConfig,
) -> Vec<StockSnapshot> {
    if keys.is_empty() {
        return Vec::new();
    }

    let quotes = batched(keys, config, |key| provider.get_quote(key)).await;
    let fetched = quotes.len();
    let quotes: Vec<StockSnapshot> = quotes.into_iter().filter(|q| !is_noise(&q.name)).collect();

    tracing::debug!(
        "Quoted {}/{} instruments ({} dropped as noise)",
        fetched,
        keys.len(),
        fetched - quotes.len()
    );
    quotes
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use theme_core::CandidateSource;

    struct CountingQuotes {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QuoteProvider for CountingQuotes {
        async fn get_quote(&self, key: &str) -> Option<StockSnapshot> {
            self.calls.lock().unwrap().push(key.to_string());
            if key == "없는종목" {
                return None;
            }
            Some(StockSnapshot::new(key, 1.0, 10.0, CandidateSource::Quote))
        }
    }

    #[tokio::test]
    async fn test_fetch_quotes_filters_failures_and_noise() {
        let provider = CountingQuotes { calls: Mutex::new(Vec::new()) };
        let keys: Vec<String> = ["삼성전자", "없는종목", "삼성전자우", "기아", "KODEX 200", "현대차", "LG전자"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let config = BatchConfig { size: 3, delay: Duration::from_millis(1) };

        let quotes = fetch_quotes(&provider, &keys, &config).await;
        let names: Vec<&str> = quotes.iter().map(|q| q.name.as_str()).collect();

        assert_eq!(names, vec!["삼성전자", "기아", "현대차", "LG전자"]);
        assert_eq!(provider.calls.lock().unwrap().len(), keys.len());
    }
}
