use async_trait::async_trait;

use crate::{ClassifierError, InvestorFlow, IpoListing, NewsHeadline, StockSnapshot, ThemeCandidate};

/// Live quote lookup. Failures surface as `None`, never as errors.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn get_quote(&self, code_or_name: &str) -> Option<StockSnapshot>;
}

/// Rate/volume leaders for the current session
#[async_trait]
pub trait HotMoversCollector: Send + Sync {
    async fn collect_hot_movers(&self) -> Vec<StockSnapshot>;
}

/// Stocks crawled per taxonomy sector, tagged with `sector_hint`
#[async_trait]
pub trait SectorCollector: Send + Sync {
    async fn collect_sector_stocks(&self) -> Vec<StockSnapshot>;
}

#[async_trait]
pub trait NewsCollector: Send + Sync {
    async fn collect_headlines(&self) -> Vec<NewsHeadline>;
}

/// Recently listed stocks within `window_days` of listing
#[async_trait]
pub trait IpoCollector: Send + Sync {
    async fn collect_ipos(&self, window_days: u32) -> Vec<IpoListing>;
}

/// LLM-backed theme labeling. Best effort: callers treat errors as "no suggestions".
#[async_trait]
pub trait ThemeClassifier: Send + Sync {
    async fn classify(
        &self,
        headlines: &[NewsHeadline],
        hot_pool: &[StockSnapshot],
    ) -> Result<Vec<ThemeCandidate>, ClassifierError>;
}

/// Foreign/institutional flow and short interest per instrument code
#[async_trait]
pub trait InvestorFlowProvider: Send + Sync {
    async fn get_flow(&self, code: &str) -> Option<InvestorFlow>;
}
