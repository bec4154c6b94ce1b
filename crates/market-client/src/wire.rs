//! Gateway response shapes and their mapping onto `StockSnapshot`.
//!
//! Numeric fields arrive as display strings ("71,300", "848,109백만"), so
//! everything is parsed leniently: unparseable values become zero.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use theme_core::{CandidateSource, LimitType, MarketStatus, NewsHeadline, StockSnapshot, ViType};

/// `{ code, text, name }` status marker
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusCode {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteItem {
    pub stock_name: String,
    #[serde(default)]
    pub item_code: Option<String>,
    #[serde(default)]
    pub close_price: Option<String>,
    #[serde(default)]
    pub fluctuations_ratio: Option<String>,
    #[serde(default)]
    pub compare_to_previous_price: Option<StatusCode>,
    #[serde(default)]
    pub trade_stop_type: Option<StatusCode>,
    #[serde(default)]
    pub accumulated_trading_value: Option<String>,
    #[serde(default)]
    pub open_price: Option<String>,
    #[serde(default)]
    pub high_price: Option<String>,
    #[serde(default)]
    pub low_price: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StockListResponse {
    #[serde(default)]
    pub stocks: Vec<QuoteItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct NewsResponse {
    #[serde(default)]
    pub articles: Vec<NewsArticle>,
}

impl From<NewsArticle> for NewsHeadline {
    fn from(a: NewsArticle) -> Self {
        NewsHeadline {
            title: a.title.trim().to_string(),
            url: a.url,
            source: a.source,
            published_at: a.published_at,
            body: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewsBodyResponse {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpoItem {
    #[serde(flatten)]
    pub quote: QuoteItem,
    pub listed_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct IpoResponse {
    #[serde(default)]
    pub listings: Vec<IpoItem>,
}

/// Net buying in 억 won, short ratio in percent
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorResponse {
    #[serde(default)]
    pub foreign_net_buy: f64,
    #[serde(default)]
    pub institution_net_buy: f64,
    #[serde(default)]
    pub short_ratio: Option<f64>,
}

/// "71,300" → 71300.0; "-" and garbage → 0.0
pub fn parse_number(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else { return 0.0 };
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '+' && *c != '%').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "-" {
        return 0.0;
    }
    cleaned.parse().unwrap_or(0.0)
}

/// Traded value as reported ("848,109백만" in millions of won) converted to 억 won.
pub fn parse_trading_value(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else { return 0.0 };
    let millions = raw.contains("백만");
    let value = parse_number(Some(&raw.replace("백만", "").replace('억', "")));
    if millions {
        (value / 100.0).round()
    } else {
        value
    }
}

/// Code '1' or UPPER_LIMIT is the upper limit; LOWER_LIMIT the lower.
pub fn parse_limit(status: Option<&StatusCode>) -> Option<LimitType> {
    let status = status?;
    if status.name == "UPPER_LIMIT" || status.code == "1" {
        Some(LimitType::Upper)
    } else if status.name == "LOWER_LIMIT" {
        Some(LimitType::Lower)
    } else {
        None
    }
}

/// Returns `(is_vi, vi_type)`.
pub fn parse_vi(status: Option<&StatusCode>) -> (bool, Option<ViType>) {
    let Some(status) = status else {
        return (false, None);
    };
    let halted = status.name == "HALT" || status.name == "SUSPENDED";
    let is_vi = status.name.contains("VI") || status.code == "2" || status.code == "3" || halted;

    let vi_type = if status.name.contains("STATIC") || status.code == "2" {
        Some(ViType::Static)
    } else if status.name.contains("DYNAMIC") || status.code == "3" {
        Some(ViType::Dynamic)
    } else if halted {
        Some(ViType::Halt)
    } else {
        None
    };
    (is_vi, vi_type)
}

/// Falling (code '4') and lower-limit (code '5') markers force a negative rate.
fn signed_rate(ratio: Option<&str>, compare: Option<&StatusCode>) -> f64 {
    let rate = parse_number(ratio);
    match compare.map(|c| c.code.as_str()) {
        Some("4") | Some("5") => -rate.abs(),
        _ => rate,
    }
}

impl QuoteItem {
    pub fn into_snapshot(self, source: CandidateSource, now: DateTime<Utc>) -> StockSnapshot {
        let compare = self.compare_to_previous_price.as_ref();
        let limit_type = parse_limit(compare);
        let (is_vi, vi_type) = parse_vi(self.trade_stop_type.as_ref());

        let mut stock = StockSnapshot::new(
            self.stock_name.trim(),
            signed_rate(self.fluctuations_ratio.as_deref(), compare),
            parse_trading_value(self.accumulated_trading_value.as_deref()),
            source,
        )
        .fetched_at(now);

        stock.code = self.item_code.filter(|c| !c.trim().is_empty());
        stock.price = parse_number(self.close_price.as_deref());
        stock.open = parse_number(self.open_price.as_deref());
        stock.high = parse_number(self.high_price.as_deref());
        stock.low = parse_number(self.low_price.as_deref());
        stock.is_limit = limit_type.is_some();
        stock.limit_type = limit_type;
        stock.is_vi = is_vi;
        stock.vi_type = vi_type;
        stock.market_status = Some(MarketStatus::at(now));
        stock
    }
}
