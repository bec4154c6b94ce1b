//! Cycle orchestration: collect → synthesize → group → select → rate.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use theme_core::{
    is_noise, ClassifierError, HotMoversCollector, InvestorFlowProvider, IpoCollector, IpoListing, MarketStatus,
    NewsCollector, NewsHeadline, QuoteProvider, SectorCollector, SessionPhase, StockPool, StockSnapshot, Theme,
    ThemeCandidate, ThemeClassifier, ThemeError, ThemeTaxonomy,
};

use crate::batch::fetch_quotes;
use crate::config::PipelineConfig;
use crate::grouper::{regenerate_headline, ThemeGrouper};
use crate::news_extract::extract_stock_mentions;
use crate::selector::ThemeSelector;
use crate::star_rater::StarRater;
use crate::supply::apply_supply_adjustments;
use crate::synthesizer::ThemeSynthesizer;

/// External collaborators, injected so tests can substitute fakes.
#[derive(Clone)]
pub struct PipelineDeps {
    pub quotes: Arc<dyn QuoteProvider>,
    pub hot_movers: Arc<dyn HotMoversCollector>,
    pub sectors: Arc<dyn SectorCollector>,
    pub news: Arc<dyn NewsCollector>,
    pub ipos: Arc<dyn IpoCollector>,
    pub classifier: Option<Arc<dyn ThemeClassifier>>,
    pub investor_flow: Option<Arc<dyn InvestorFlowProvider>>,
}

/// Everything gathered from collectors for one rebuild.
#[derive(Debug, Clone, Default)]
pub struct CycleInputs {
    pub hot_movers: Vec<StockSnapshot>,
    pub sector_stocks: Vec<StockSnapshot>,
    pub news_stocks: Vec<StockSnapshot>,
    pub headlines: Vec<NewsHeadline>,
    pub ipos: Vec<IpoListing>,
}

impl CycleInputs {
    pub fn is_empty(&self) -> bool {
        self.hot_movers.is_empty()
            && self.sector_stocks.is_empty()
            && self.news_stocks.is_empty()
            && self.headlines.is_empty()
    }

    /// Deduplicated candidate pool; noise is dropped again at this boundary.
    pub fn pool(&self) -> StockPool {
        self.hot_movers
            .iter()
            .chain(self.sector_stocks.iter())
            .chain(self.news_stocks.iter())
            .filter(|s| !is_noise(&s.name))
            .cloned()
            .collect()
    }
}

/// Published theme set, replaced wholesale on every rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub themes: Vec<Theme>,
    pub hot_stocks: Vec<StockSnapshot>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
    pub version: u64,
    pub market_status: MarketStatus,
    pub phase: SessionPhase,
}

impl PipelineResult {
    /// Placeholder served before the first rebuild completes.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            themes: Vec::new(),
            hot_stocks: Vec::new(),
            last_updated: now,
            version: 0,
            market_status: MarketStatus::at(now),
            phase: SessionPhase::at(now),
        }
    }

    fn stars_by_id(&self) -> HashMap<String, u8> {
        self.themes.iter().map(|t| (t.id.clone(), t.stars)).collect()
    }
}

pub struct ThemePipeline {
    deps: PipelineDeps,
    taxonomy: Arc<ThemeTaxonomy>,
    config: PipelineConfig,
    synthesizer: ThemeSynthesizer,
    grouper: ThemeGrouper,
    selector: ThemeSelector,
    rater: StarRater,
}

impl ThemePipeline {
    pub fn new(deps: PipelineDeps, taxonomy: Arc<ThemeTaxonomy>, config: PipelineConfig) -> Self {
        let synthesizer = ThemeSynthesizer::new(taxonomy.clone(), deps.quotes.clone(), config.clone());
        let grouper = ThemeGrouper::new(
            taxonomy.clone(),
            config.max_stocks_per_group,
            config.conglomerate_hot_rate,
        );
        let selector = ThemeSelector::new(taxonomy.clone(), config.clone());

        Self {
            deps,
            taxonomy,
            config,
            synthesizer,
            grouper,
            selector,
            rater: StarRater::new(),
        }
    }

    pub fn taxonomy(&self) -> &Arc<ThemeTaxonomy> {
        &self.taxonomy
    }

    /// Query every collector concurrently. Collectors never fail; a broken
    /// source simply contributes nothing.
    pub async fn collect(&self) -> CycleInputs {
        let (hot_movers, sector_stocks, headlines, ipos) = tokio::join!(
            self.deps.hot_movers.collect_hot_movers(),
            self.deps.sectors.collect_sector_stocks(),
            self.deps.news.collect_headlines(),
            self.deps.ipos.collect_ipos(self.config.ipo.window_days),
        );

        let hot_movers: Vec<StockSnapshot> = hot_movers.into_iter().filter(|s| !is_noise(&s.name)).collect();
        let sector_stocks: Vec<StockSnapshot> = sector_stocks.into_iter().filter(|s| !is_noise(&s.name)).collect();
        let news_stocks = self.quote_news_mentions(&headlines, &hot_movers, &sector_stocks).await;

        tracing::info!(
            "📥 Collected {} hot movers, {} sector stocks, {} news stocks, {} headlines, {} IPOs",
            hot_movers.len(),
            sector_stocks.len(),
            news_stocks.len(),
            headlines.len(),
            ipos.len()
        );

        CycleInputs {
            hot_movers,
            sector_stocks,
            news_stocks,
            headlines,
            ipos,
        }
    }

    async fn quote_news_mentions(
        &self,
        headlines: &[NewsHeadline],
        hot_movers: &[StockSnapshot],
        sector_stocks: &[StockSnapshot],
    ) -> Vec<StockSnapshot> {
        if headlines.is_empty() {
            return Vec::new();
        }

        let mut known: Vec<&str> = self.taxonomy.known_stock_names();
        known.extend(hot_movers.iter().chain(sector_stocks.iter()).map(|s| s.name.as_str()));
        known.sort_unstable();
        known.dedup();

        let mentions = extract_stock_mentions(headlines, &known);
        if mentions.is_empty() {
            return Vec::new();
        }

        fetch_quotes(self.deps.quotes.as_ref(), &mentions, &self.config.batch)
            .await
            .into_iter()
            .filter(|q| q.rate != 0.0)
            .map(|mut q| {
                q.source = theme_core::CandidateSource::News;
                q
            })
            .collect()
    }

    /// AI suggestions with rate-limit retries; any terminal failure means "no suggestions".
    pub async fn fetch_ai_themes(&self, headlines: &[NewsHeadline], pool: &[StockSnapshot]) -> Vec<ThemeCandidate> {
        let Some(classifier) = self.deps.classifier.as_ref() else {
            return Vec::new();
        };
        if headlines.is_empty() && pool.is_empty() {
            return Vec::new();
        }

        let classifier = classifier.as_ref();
        let result = self
            .config
            .retry
            .run(
                |_attempt| classifier.classify(headlines, pool),
                |e: &ClassifierError| e.is_rate_limited(),
            )
            .await;

        match result {
            Ok(candidates) => {
                let candidates: Vec<ThemeCandidate> =
                    candidates.into_iter().filter(|c| !c.name.trim().is_empty()).collect();
                tracing::info!("🤖 AI classifier suggested {} themes", candidates.len());
                candidates
            }
            Err(e) => {
                tracing::warn!("AI classification unavailable, using taxonomy only: {}", e);
                Vec::new()
            }
        }
    }

    /// Turn collected inputs into a published result.
    pub async fn build(
        &self,
        inputs: CycleInputs,
        now: DateTime<Utc>,
        previous: Option<&PipelineResult>,
    ) -> Result<PipelineResult, ThemeError> {
        if inputs.is_empty() {
            return Err(ThemeError::InsufficientData(
                "no hot movers, sector stocks or headlines collected".to_string(),
            ));
        }

        let pool = inputs.pool();
        let suggestions = self.fetch_ai_themes(&inputs.headlines, pool.as_slice()).await;

        let synthesized = self.synthesizer.synthesize(&pool, &suggestions).await;
        let grouped = self.grouper.group(synthesized, self.config.max_grouped_themes);

        let today = now.with_timezone(&chrono_tz::Asia::Seoul).date_naive();
        let mut themes = self
            .selector
            .select_final(&grouped, &inputs.ipos, &pool, self.selector.limits(), today);

        if let Some(provider) = &self.deps.investor_flow {
            apply_supply_adjustments(provider.as_ref(), &mut themes, &self.config.batch).await;
        }

        let phase = SessionPhase::at(now);
        let previous_stars = previous.map(|p| p.stars_by_id()).unwrap_or_default();
        self.rater.apply(&mut themes, phase, &previous_stars);

        let mut hot_stocks = pool.into_vec();
        hot_stocks.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(Ordering::Equal));
        hot_stocks.truncate(self.config.hot_stock_limit);

        let version = previous.map(|p| p.version + 1).unwrap_or(1);
        tracing::info!(
            "✅ Theme set v{} ready: {} themes, {} hot stocks ({})",
            version,
            themes.len(),
            hot_stocks.len(),
            MarketStatus::at(now)
        );

        Ok(PipelineResult {
            themes,
            hot_stocks,
            last_updated: now,
            version,
            market_status: MarketStatus::at(now),
            phase,
        })
    }

    /// Full rebuild: collect from every source, then build.
    pub async fn run_cycle(&self, previous: Option<&PipelineResult>) -> Result<PipelineResult, ThemeError> {
        let inputs = self.collect().await;
        self.build(inputs, Utc::now(), previous).await
    }

    /// Re-quote the stocks of an existing result without changing its theme set.
    ///
    /// Stocks whose quote fails keep their previous snapshot. Theme order,
    /// ids and `version` are preserved so consumers keep their keys.
    pub async fn refresh_prices(&self, previous: &PipelineResult, now: DateTime<Utc>) -> PipelineResult {
        let mut keys: Vec<String> = Vec::new();
        for stock in previous.themes.iter().flat_map(|t| t.stocks.iter()) {
            let key = stock.code.clone().unwrap_or_else(|| stock.name.clone());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let fresh: StockPool = fetch_quotes(self.deps.quotes.as_ref(), &keys, &self.config.batch)
            .await
            .into_iter()
            .collect();

        let mut refreshed = previous.clone();
        let mut updated = 0usize;
        for theme in refreshed.themes.iter_mut() {
            for stock in theme.stocks.iter_mut() {
                if let Some(quote) = lookup_fresh(&fresh, stock) {
                    apply_quote(stock, quote);
                    updated += 1;
                }
            }
            theme.recompute();
            if !theme.is_special {
                regenerate_headline(theme);
            }
        }
        for stock in refreshed.hot_stocks.iter_mut() {
            if let Some(quote) = lookup_fresh(&fresh, stock) {
                apply_quote(stock, quote);
            }
        }

        let phase = SessionPhase::at(now);
        self.rater.apply(&mut refreshed.themes, phase, &previous.stars_by_id());

        refreshed.last_updated = now;
        refreshed.market_status = MarketStatus::at(now);
        refreshed.phase = phase;

        tracing::debug!(
            "🔄 Refreshed {}/{} stock quotes for v{}",
            updated,
            keys.len(),
            refreshed.version
        );
        refreshed
    }
}

fn lookup_fresh<'p>(fresh: &'p StockPool, stock: &StockSnapshot) -> Option<&'p StockSnapshot> {
    match &stock.code {
        Some(code) => fresh.get(code).or_else(|| fresh.get(&stock.name).filter(|q| q.code.is_none())),
        None => fresh.get(&stock.name),
    }
}

/// Market fields follow the quote; identity and provenance stay put.
fn apply_quote(stock: &mut StockSnapshot, quote: &StockSnapshot) {
    if quote.fetched_at < stock.fetched_at {
        return;
    }
    stock.price = quote.price;
    stock.rate = quote.rate;
    stock.amount = quote.amount;
    stock.open = quote.open;
    stock.high = quote.high;
    stock.low = quote.low;
    stock.market_status = quote.market_status;
    stock.is_limit = quote.is_limit;
    stock.limit_type = quote.limit_type;
    stock.is_vi = quote.is_vi;
    stock.vi_type = quote.vi_type;
    stock.fetched_at = quote.fetched_at;
    if stock.code.is_none() {
        stock.code = quote.code.clone();
    }
}
