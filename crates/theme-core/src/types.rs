use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::market_phase::MarketStatus;
use crate::scoring;

/// Reserved catch-all theme names. These never compete for core slots and are never star-rated.
pub const INDIVIDUAL_ISSUE: &str = "개별이슈";
pub const OTHER: &str = "기타";
pub const OTHER_SECTOR: &str = "기타섹터";
pub const NEW_LISTING: &str = "신규상장";

pub const RESERVED_THEME_NAMES: [&str; 4] = [INDIVIDUAL_ISSUE, OTHER, OTHER_SECTOR, NEW_LISTING];

pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_THEME_NAMES.contains(&name)
}

/// Price-limit state reported by the quote feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitType {
    Upper,
    Lower,
}

/// Volatility interruption kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViType {
    Static,
    Dynamic,
    Halt,
}

/// Which collector produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    HotMovers,
    Sector,
    News,
    Ipo,
    Quote,
}

/// Point-in-time market data for one instrument.
///
/// `amount` is traded value in 억 won. Identity is `code` when both sides
/// carry one, otherwise the display name (a lower-confidence match).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub price: f64,
    pub rate: f64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_status: Option<MarketStatus>,
    #[serde(default)]
    pub is_limit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_type: Option<LimitType>,
    #[serde(default, rename = "isVI")]
    pub is_vi: bool,
    #[serde(default, rename = "viType", skip_serializing_if = "Option::is_none")]
    pub vi_type: Option<ViType>,
    pub fetched_at: DateTime<Utc>,
    pub source: CandidateSource,
    /// Taxonomy sector the collector found this stock under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_hint: Option<String>,
    /// Original theme for stocks folded into the other-sector bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_theme: Option<String>,
    #[serde(default, rename = "isIPO")]
    pub is_ipo: bool,
}

impl StockSnapshot {
    pub fn new(name: impl Into<String>, rate: f64, amount: f64, source: CandidateSource) -> Self {
        Self {
            name: name.into(),
            code: None,
            price: 0.0,
            rate,
            amount,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            market_status: None,
            is_limit: false,
            limit_type: None,
            is_vi: false,
            vi_type: None,
            fetched_at: Utc::now(),
            source,
            sector_hint: None,
            source_theme: None,
            is_ipo: false,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector_hint = Some(sector.into());
        self
    }

    pub fn fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = at;
        self
    }

    pub fn same_instrument(&self, other: &StockSnapshot) -> bool {
        match (&self.code, &other.code) {
            (Some(a), Some(b)) => a == b,
            _ => self.name == other.name,
        }
    }

    /// Matches either the instrument code or the display name.
    pub fn matches_key(&self, key: &str) -> bool {
        self.name == key || self.code.as_deref() == Some(key)
    }

    pub fn is_upper_limit(&self) -> bool {
        self.limit_type == Some(LimitType::Upper)
    }

    /// Ordering weight used when trimming a theme's stock list
    pub fn momentum_weight(&self) -> f64 {
        self.rate + self.amount / 100.0
    }
}

/// Bookkeeping for a theme that was split into numbered parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitInfo {
    pub original_name: String,
    pub part_number: usize,
    pub total_parts: usize,
    pub total_stocks: usize,
}

/// A named cluster of stocks sharing a market narrative
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: String,
    pub name: String,
    pub headline: String,
    pub stocks: Vec<StockSnapshot>,
    pub score: f64,
    pub total_volume: f64,
    #[serde(default)]
    pub rank_score: f64,
    #[serde(default)]
    pub is_hot: bool,
    #[serde(default)]
    pub is_special: bool,
    #[serde(default)]
    pub is_conglomerate: bool,
    #[serde(default)]
    pub is_core: bool,
    #[serde(default)]
    pub is_new_issue: bool,
    #[serde(default)]
    pub stars: u8,
    #[serde(default)]
    pub star_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_info: Option<SplitInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_themes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_adjustment: Option<f64>,
}

impl Theme {
    pub fn new(name: impl Into<String>, stocks: Vec<StockSnapshot>) -> Self {
        let name = name.into();
        let headline = default_headline(&name, &stocks);
        let mut theme = Self {
            id: name.clone(),
            name,
            headline,
            stocks,
            score: 0.0,
            total_volume: 0.0,
            rank_score: 0.0,
            is_hot: false,
            is_special: false,
            is_conglomerate: false,
            is_core: false,
            is_new_issue: false,
            stars: 0,
            star_reason: String::new(),
            split_info: None,
            source_themes: Vec::new(),
            supply_adjustment: None,
        };
        theme.recompute();
        theme
    }

    pub fn special(name: &str, headline: String, stocks: Vec<StockSnapshot>) -> Self {
        let mut theme = Self::new(name, stocks);
        theme.headline = headline;
        theme.is_special = true;
        theme
    }

    /// Re-derive score and traded value from the current stock list.
    pub fn recompute(&mut self) {
        self.score = scoring::theme_score(&self.stocks);
        self.total_volume = scoring::total_volume(&self.stocks);
    }

    pub fn contains(&self, stock: &StockSnapshot) -> bool {
        self.stocks.iter().any(|s| s.same_instrument(stock))
    }

    pub fn top_stock(&self) -> Option<&StockSnapshot> {
        self.stocks
            .iter()
            .max_by(|a, b| a.rate.partial_cmp(&b.rate).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn refresh_headline(&mut self) {
        self.headline = default_headline(&self.name, &self.stocks);
    }
}

/// "삼성전자 +5.2% 등 반도체 강세"
pub fn default_headline(theme_name: &str, stocks: &[StockSnapshot]) -> String {
    let top = stocks
        .iter()
        .max_by(|a, b| a.rate.partial_cmp(&b.rate).unwrap_or(std::cmp::Ordering::Equal));
    match top {
        Some(s) => format!("{} {:+.1}% 등 {} 강세", s.name, s.rate, theme_name),
        None => format!("{} 테마 동향", theme_name),
    }
}

/// Theme label suggested by the AI classifier. Stocks are names only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeCandidate {
    pub name: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub stocks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsHeadline {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Leading article text, fetched for the top few headlines only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Recently listed instrument with its listing date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpoListing {
    pub stock: StockSnapshot,
    pub listed_on: NaiveDate,
}

/// Foreign/institutional net buying (억 won) and short ratio (%) for one code
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestorFlow {
    pub code: String,
    pub foreign_net_buy: f64,
    pub institution_net_buy: f64,
    #[serde(default)]
    pub short_ratio: Option<f64>,
}

impl InvestorFlow {
    pub fn net_buy(&self) -> f64 {
        self.foreign_net_buy + self.institution_net_buy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_prefers_code() {
        let a = StockSnapshot::new("삼성전자", 1.0, 10.0, CandidateSource::HotMovers).with_code("005930");
        let b = StockSnapshot::new("Samsung Elec", 2.0, 10.0, CandidateSource::News).with_code("005930");
        let c = StockSnapshot::new("삼성전자", 2.0, 10.0, CandidateSource::News).with_code("005935");
        let d = StockSnapshot::new("삼성전자", 2.0, 10.0, CandidateSource::Sector);

        assert!(a.same_instrument(&b));
        assert!(!a.same_instrument(&c));
        // name fallback when one side has no code
        assert!(a.same_instrument(&d));
    }

    #[test]
    fn test_headline_uses_top_mover() {
        let stocks = vec![
            StockSnapshot::new("에코프로", 4.25, 100.0, CandidateSource::Sector),
            StockSnapshot::new("금양", 12.0, 50.0, CandidateSource::Sector),
        ];
        assert_eq!(default_headline("2차전지", &stocks), "금양 +12.0% 등 2차전지 강세");
        assert_eq!(default_headline("2차전지", &[]), "2차전지 테마 동향");
    }

    #[test]
    fn test_theme_serializes_camel_case() {
        let theme = Theme::new("로봇", vec![StockSnapshot::new("로보티즈", 10.0, 100.0, CandidateSource::HotMovers)]);
        let json = serde_json::to_value(&theme).unwrap();
        assert!(json.get("totalVolume").is_some());
        assert!(json.get("isSpecial").is_some());
        assert!(json.get("starReason").is_some());
        assert_eq!(json["stocks"][0]["isIPO"], false);
    }
}
