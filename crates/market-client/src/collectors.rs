use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use theme_core::{
    dedup_latest, is_noise, CandidateSource, HotMoversCollector, InvestorFlow, InvestorFlowProvider, IpoCollector,
    IpoListing, NewsCollector, NewsHeadline, QuoteProvider, SectorCollector, StockSnapshot,
};

use crate::wire::{InvestorResponse, IpoResponse, NewsBodyResponse, NewsResponse, StockListResponse};
use crate::MarketDataClient;

/// Ranking boards merged into the hot-mover pool
const RANKINGS: [&str; 2] = ["up", "value"];
const SECTOR_CONCURRENCY: usize = 5;
/// Leading headlines whose article text is pulled
const BODY_ARTICLES: usize = 5;
const BODY_CHARS: usize = 2000;

/// Run `fetch` over `keys` one chunk at a time, pausing `delay` between chunks.
async fn in_chunks<T, F, Fut>(keys: &[String], size: usize, delay: Duration, fetch: F) -> Vec<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Vec<T>>,
{
    let mut all = Vec::new();
    for (i, chunk) in keys.chunks(size.max(1)).enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let results = join_all(chunk.iter().cloned().map(&fetch)).await;
        all.extend(results.into_iter().flatten());
    }
    all
}

impl MarketDataClient {
    async fn stock_list(&self, path: &str, query: &[(&str, String)], source: CandidateSource) -> Vec<StockSnapshot> {
        match self.get_json::<StockListResponse>(path, query).await {
            Ok(list) => {
                let now = Utc::now();
                list.stocks
                    .into_iter()
                    .map(|item| item.into_snapshot(source, now))
                    .filter(|s| !is_noise(&s.name))
                    .collect()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", path, e);
                Vec::new()
            }
        }
    }

    /// Article text trimmed to its first `BODY_CHARS` characters.
    async fn article_body(&self, url: &str) -> Option<String> {
        match self
            .get_json::<NewsBodyResponse>("/api/news/body", &[("url", url.to_string())])
            .await
        {
            Ok(found) => {
                let body: String = found.body.trim().chars().take(BODY_CHARS).collect();
                (!body.is_empty()).then_some(body)
            }
            Err(e) => {
                tracing::debug!("No article body for {}: {}", url, e);
                None
            }
        }
    }

    async fn sector_stocks(&self, sector: &str) -> Vec<StockSnapshot> {
        self.stock_list("/api/sector/stocks", &[("name", sector.to_string())], CandidateSource::Sector)
            .await
            .into_iter()
            .map(|s| s.with_sector(sector))
            .collect()
    }
}

#[async_trait]
impl QuoteProvider for MarketDataClient {
    async fn get_quote(&self, code_or_name: &str) -> Option<StockSnapshot> {
        match self.fetch_quote(code_or_name).await {
            Ok(quote) => quote,
            Err(e) => {
                tracing::warn!("Quote failed for {}: {}", code_or_name, e);
                None
            }
        }
    }
}

#[async_trait]
impl HotMoversCollector for MarketDataClient {
    async fn collect_hot_movers(&self) -> Vec<StockSnapshot> {
        let mut all = Vec::new();
        for board in RANKINGS {
            let stocks = self
                .stock_list(&format!("/api/ranking/{}", board), &[], CandidateSource::HotMovers)
                .await;
            tracing::debug!("Ranking board {}: {} stocks", board, stocks.len());
            all.extend(stocks);
        }
        dedup_latest(all)
    }
}

#[async_trait]
impl SectorCollector for MarketDataClient {
    async fn collect_sector_stocks(&self) -> Vec<StockSnapshot> {
        let names: Vec<String> = self.taxonomy().sectors.iter().map(|s| s.name.clone()).collect();
        let all = in_chunks(&names, SECTOR_CONCURRENCY, self.batch_delay(), |name| async move {
            self.sector_stocks(&name).await
        })
        .await;

        tracing::info!("📊 Sector crawl: {} stocks across {} sectors", all.len(), names.len());
        all
    }
}

#[async_trait]
impl NewsCollector for MarketDataClient {
    async fn collect_headlines(&self) -> Vec<NewsHeadline> {
        let mut headlines: Vec<NewsHeadline> = match self.get_json::<NewsResponse>("/api/news", &[]).await {
            Ok(news) => news
                .articles
                .into_iter()
                .map(NewsHeadline::from)
                .filter(|h| !h.title.is_empty())
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to fetch news headlines: {}", e);
                return Vec::new();
            }
        };

        let mut fetched = 0;
        for headline in headlines.iter_mut().take(BODY_ARTICLES) {
            let Some(url) = headline.url.clone() else { continue };
            if fetched > 0 && !self.batch_delay().is_zero() {
                tokio::time::sleep(self.batch_delay()).await;
            }
            headline.body = self.article_body(&url).await;
            fetched += 1;
        }

        tracing::debug!("News: {} headlines, {} article bodies", headlines.len(), fetched);
        headlines
    }
}

#[async_trait]
impl IpoCollector for MarketDataClient {
    async fn collect_ipos(&self, window_days: u32) -> Vec<IpoListing> {
        match self
            .get_json::<IpoResponse>("/api/ipo/recent", &[("days", window_days.to_string())])
            .await
        {
            Ok(ipos) => {
                let now = Utc::now();
                ipos.listings
                    .into_iter()
                    .filter(|l| !is_noise(&l.quote.stock_name))
                    .map(|l| {
                        let mut stock = l.quote.into_snapshot(CandidateSource::Ipo, now);
                        stock.is_ipo = true;
                        IpoListing {
                            stock,
                            listed_on: l.listed_on,
                        }
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch recent listings: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl InvestorFlowProvider for MarketDataClient {
    async fn get_flow(&self, code: &str) -> Option<InvestorFlow> {
        match self
            .get_json::<InvestorResponse>(&format!("/api/stock/{}/investor", code), &[])
            .await
        {
            Ok(flow) => Some(InvestorFlow {
                code: code.to_string(),
                foreign_net_buy: flow.foreign_net_buy,
                institution_net_buy: flow.institution_net_buy,
                short_ratio: flow.short_ratio,
            }),
            Err(e) => {
                tracing::debug!("No investor flow for {}: {}", code, e);
                None
            }
        }
    }
}
