//! Final theme selection: core ranking, splitting, and catch-all buckets.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::NaiveDate;
use theme_core::{
    default_headline, is_noise, is_reserved_name, scoring, IpoListing, SplitInfo, StockPool, StockSnapshot, Theme,
    ThemeTaxonomy, INDIVIDUAL_ISSUE, NEW_LISTING, OTHER_SECTOR,
};

use crate::config::PipelineConfig;
use crate::grouper::{regenerate_headline, sort_by_momentum};

const PART_LABELS: [&str; 3] = ["①", "②", "③"];

#[derive(Debug, Clone, Copy)]
pub struct SelectionLimits {
    pub max_core: usize,
    pub max_total: usize,
}

pub struct ThemeSelector {
    taxonomy: Arc<ThemeTaxonomy>,
    config: PipelineConfig,
}

impl ThemeSelector {
    pub fn new(taxonomy: Arc<ThemeTaxonomy>, config: PipelineConfig) -> Self {
        Self { taxonomy, config }
    }

    pub fn limits(&self) -> SelectionLimits {
        SelectionLimits {
            max_core: self.config.max_core_themes,
            max_total: self.config.max_total_themes,
        }
    }

    /// Core themes (split where strong and crowded) followed by up to three
    /// special buckets, never more than `limits.max_total` in total.
    pub fn select_final(
        &self,
        grouped: &[Theme],
        ipos: &[IpoListing],
        pool: &StockPool,
        limits: SelectionLimits,
        today: NaiveDate,
    ) -> Vec<Theme> {
        let core = self.select_core(grouped, pool, limits.max_core);
        let core_names: Vec<String> = core.iter().map(|t| t.name.clone()).collect();

        let mut result = self.split_large_themes(core);

        let specials = [
            self.individual_issue_theme(grouped, pool),
            self.new_listing_theme(ipos, pool, today),
            self.other_sector_theme(grouped, &core_names, &result),
        ];
        for special in specials.into_iter().flatten() {
            if result.len() >= limits.max_total {
                break;
            }
            tracing::debug!("Added special theme {} ({} stocks)", special.name, special.stocks.len());
            result.push(special);
        }

        result.truncate(limits.max_total);

        tracing::info!(
            "🏁 Selected {} final themes ({} core candidates, {} grouped)",
            result.len(),
            core_names.len(),
            grouped.len()
        );
        result
    }

    /// Rank non-special, non-peripheral themes and keep the top `max_core`.
    pub fn select_core(&self, grouped: &[Theme], pool: &StockPool, max_core: usize) -> Vec<Theme> {
        let mut candidates: Vec<Theme> = grouped
            .iter()
            .filter(|t| !t.is_special && !is_reserved_name(&t.name) && !self.taxonomy.is_peripheral(&t.name))
            .cloned()
            .map(|mut t| {
                t.rank_score = scoring::rank_score(&t.stocks);
                t.is_core = true;
                t
            })
            .collect();

        candidates.sort_by(|a, b| b.rank_score.partial_cmp(&a.rank_score).unwrap_or(Ordering::Equal));
        candidates.truncate(max_core);

        for theme in candidates.iter_mut() {
            self.ensure_minimum_stocks(theme, pool);
            tracing::debug!(
                "Core theme {} (rank {:.1}, {} stocks)",
                theme.name,
                theme.rank_score,
                theme.stocks.len()
            );
        }
        candidates
    }

    /// Top up thin sector themes from the live pool: roster names first, then keyword hits.
    fn ensure_minimum_stocks(&self, theme: &mut Theme, pool: &StockPool) {
        let min = self.config.min_core_stocks;
        if theme.stocks.len() >= min {
            return;
        }
        let Some(sector) = self.taxonomy.sector(&theme.name) else {
            return;
        };

        let before = theme.stocks.len();
        for name in &sector.representative_stocks {
            if theme.stocks.len() >= min {
                break;
            }
            if let Some(stock) = pool.get(name) {
                if !theme.contains(stock) {
                    theme.stocks.push(stock.clone());
                }
            }
        }
        for stock in pool.iter() {
            if theme.stocks.len() >= min {
                break;
            }
            if !is_noise(&stock.name) && sector.matches_stock(&stock.name) && !theme.contains(stock) {
                theme.stocks.push(stock.clone());
            }
        }

        if theme.stocks.len() > before {
            tracing::debug!("[Top-up] {}: {} -> {} stocks", theme.name, before, theme.stocks.len());
            theme.recompute();
            regenerate_headline(theme);
        }
    }

    /// Split crowded strong themes into numbered parts; cap the rest.
    pub fn split_large_themes(&self, themes: Vec<Theme>) -> Vec<Theme> {
        let split = &self.config.split;
        let per_part = split.stocks_per_part.max(1);
        let mut result = Vec::new();

        for mut theme in themes {
            theme.recompute();
            let should_split =
                theme.stocks.len() >= split.min_stocks_to_split && theme.score >= split.min_score_to_split;

            if !should_split {
                theme.stocks.truncate(per_part);
                theme.recompute();
                result.push(theme);
                continue;
            }

            let mut sorted = theme.stocks.clone();
            sorted.sort_by(|a, b| {
                let wa = a.rate * 2.0 + a.amount / 100.0;
                let wb = b.rate * 2.0 + b.amount / 100.0;
                wb.partial_cmp(&wa).unwrap_or(Ordering::Equal)
            });

            let total_stocks = sorted.len();
            let part_count = sorted.len().div_ceil(per_part).min(split.max_parts.max(1));
            tracing::debug!("[Split] {}: {} stocks -> {} parts", theme.name, total_stocks, part_count);

            for (i, part_stocks) in sorted.chunks(per_part).take(part_count).enumerate() {
                let part_number = i + 1;
                let name = if part_count > 1 {
                    match PART_LABELS.get(i) {
                        Some(label) => format!("{}{}", theme.name, label),
                        None => format!("{}({})", theme.name, part_number),
                    }
                } else {
                    theme.name.clone()
                };

                let mut part = theme.clone();
                part.id = format!("{}_part{}", theme.id, part_number);
                part.headline = default_headline(&name, part_stocks);
                part.name = name;
                part.stocks = part_stocks.to_vec();
                part.split_info = Some(SplitInfo {
                    original_name: theme.name.clone(),
                    part_number,
                    total_parts: part_count,
                    total_stocks,
                });
                part.recompute();
                result.push(part);
            }
        }

        result
    }

    /// Stocks that landed in no theme, plus any AI-flagged individual issues.
    pub fn individual_issue_theme(&self, grouped: &[Theme], pool: &StockPool) -> Option<Theme> {
        let mut stocks = StockPool::new();
        if let Some(existing) = grouped.iter().find(|t| t.name == INDIVIDUAL_ISSUE) {
            stocks.extend(existing.stocks.iter().cloned());
        }

        let themed: Vec<&Theme> = grouped.iter().filter(|t| t.name != INDIVIDUAL_ISSUE).collect();
        for stock in pool.iter() {
            if is_noise(&stock.name) || themed.iter().any(|t| t.contains(stock)) {
                continue;
            }
            stocks.insert(stock.clone());
        }

        let mut stocks = stocks.into_vec();
        stocks.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(Ordering::Equal));
        stocks.truncate(self.config.special_max_stocks);

        let top = stocks.first()?;
        let headline = format!("{} {:+.1}% 등 개별 종목 {}개 강세", top.name, top.rate, stocks.len());
        Some(Theme::special(INDIVIDUAL_ISSUE, headline, stocks))
    }

    /// Recent listings, enriched with live pool data.
    pub fn new_listing_theme(&self, ipos: &[IpoListing], pool: &StockPool, today: NaiveDate) -> Option<Theme> {
        let ipo = &self.config.ipo;

        let mut stocks: Vec<StockSnapshot> = ipos
            .iter()
            .filter(|l| {
                let age = (today - l.listed_on).num_days();
                (0..=ipo.window_days as i64).contains(&age)
            })
            .filter(|l| !is_noise(&l.stock.name))
            .map(|l| {
                let mut stock = l.stock.clone();
                let live = stock
                    .code
                    .as_deref()
                    .and_then(|c| pool.get(c))
                    .or_else(|| pool.get(&stock.name));
                if let Some(live) = live {
                    if live.rate != 0.0 {
                        stock.rate = live.rate;
                    }
                    if live.amount != 0.0 {
                        stock.amount = live.amount;
                    }
                    if live.price != 0.0 {
                        stock.price = live.price;
                    }
                    if stock.code.is_none() {
                        stock.code = live.code.clone();
                    }
                }
                stock.is_ipo = true;
                stock
            })
            .filter(|s| s.rate >= ipo.min_rate || s.amount >= ipo.min_amount)
            .collect();

        stocks = theme_core::dedup_latest(stocks);
        stocks.sort_by(|a, b| {
            let wa = a.rate + a.amount / 50.0;
            let wb = b.rate + b.amount / 50.0;
            wb.partial_cmp(&wa).unwrap_or(Ordering::Equal)
        });
        stocks.truncate(ipo.max_stocks);

        let top = stocks.first()?;
        let headline = format!("{} 등 신규상장주 {}개 움직임", top.name, stocks.len());
        Some(Theme::special(NEW_LISTING, headline, stocks))
    }

    /// Everything that did not make the core cut, folded into one bucket.
    pub fn other_sector_theme(&self, grouped: &[Theme], core_names: &[String], selected: &[Theme]) -> Option<Theme> {
        let mut source_themes = Vec::new();
        let mut merged = StockPool::new();

        for theme in grouped {
            if core_names.contains(&theme.name) || is_reserved_name(&theme.name) || theme.stocks.is_empty() {
                continue;
            }
            source_themes.push(theme.name.clone());
            for stock in &theme.stocks {
                if selected.iter().any(|t| t.contains(stock)) || merged.contains(stock) {
                    continue;
                }
                let mut stock = stock.clone();
                if stock.source_theme.is_none() {
                    stock.source_theme = Some(theme.name.clone());
                }
                merged.insert(stock);
            }
        }

        let mut stocks = merged.into_vec();
        sort_by_momentum(&mut stocks);
        stocks.truncate(self.config.special_max_stocks);
        if stocks.is_empty() {
            return None;
        }

        let listed = source_themes.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        let suffix = if source_themes.len() > 3 { " 등" } else { "" };
        let headline = format!("기타 테마 통합 ({}{})", listed, suffix);

        let mut theme = Theme::special(OTHER_SECTOR, headline, stocks);
        theme.source_themes = source_themes;
        Some(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashSet;
    use theme_core::CandidateSource;

    fn stock(name: &str, rate: f64, amount: f64) -> StockSnapshot {
        StockSnapshot::new(name, rate, amount, CandidateSource::HotMovers)
    }

    fn selector() -> ThemeSelector {
        ThemeSelector::new(Arc::new(ThemeTaxonomy::builtin()), PipelineConfig::default())
    }

    fn limits(max_core: usize, max_total: usize) -> SelectionLimits {
        SelectionLimits { max_core, max_total }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let result = selector().select_final(&[], &[], &StockPool::new(), limits(7, 10), today());
        assert!(result.is_empty());
    }

    #[test]
    fn test_split_parts_are_contiguous() {
        let stocks: Vec<StockSnapshot> = (0..13).map(|i| stock(&format!("로봇{i}"), 10.0 + i as f64, 100.0)).collect();
        let parts = selector().split_large_themes(vec![Theme::new("로봇", stocks)]);

        assert_eq!(parts.len(), 3);
        let total: usize = parts.iter().map(|p| p.stocks.len()).sum();
        assert_eq!(total, 13);
        for (i, part) in parts.iter().enumerate() {
            let info = part.split_info.as_ref().unwrap();
            assert_eq!(info.part_number, i + 1);
            assert_eq!(info.total_parts, 3);
            assert_eq!(info.total_stocks, 13);
            assert_eq!(info.original_name, "로봇");
            assert_eq!(part.id, format!("로봇_part{}", i + 1));
            assert!((part.score - scoring::theme_score(&part.stocks)).abs() < 1e-9);
        }
        assert_eq!(parts[0].name, "로봇①");
        assert_eq!(parts[0].stocks[0].name, "로봇12");
    }

    #[test]
    fn test_split_caps_at_max_parts() {
        let stocks: Vec<StockSnapshot> = (0..18).map(|i| stock(&format!("반도체{i}"), 8.0, 100.0 + i as f64)).collect();
        let parts = selector().split_large_themes(vec![Theme::new("반도체", stocks)]);
        let total: usize = parts.iter().map(|p| p.stocks.len()).sum();
        assert_eq!(parts.len(), 3);
        assert_eq!(total, 15);
    }

    #[test]
    fn test_weak_theme_is_capped_not_split() {
        let stocks: Vec<StockSnapshot> = (0..8).map(|i| stock(&format!("조선{i}"), 1.0, 100.0)).collect();
        let parts = selector().split_large_themes(vec![Theme::new("조선", stocks)]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].stocks.len(), 5);
        assert!(parts[0].split_info.is_none());
    }

    #[test]
    fn test_peripheral_and_special_excluded_from_core() {
        let grouped = vec![
            Theme::new("게임", vec![stock("크래프톤", 25.0, 5000.0)]),
            Theme::special(OTHER_SECTOR, String::new(), vec![stock("X", 1.0, 1.0)]),
            Theme::new("조선", vec![stock("한화오션", 2.0, 100.0), stock("삼성중공업", 1.0, 100.0)]),
        ];
        let core = selector().select_core(&grouped, &StockPool::new(), 7);
        assert_eq!(core.len(), 1);
        assert_eq!(core[0].name, "조선");
        assert!(core[0].is_core);
    }

    #[test]
    fn test_core_top_up_from_pool() {
        let pool: StockPool = vec![stock("HD현대중공업", 3.0, 400.0), stock("조선선재", 1.0, 50.0), stock("기아", 2.0, 100.0)]
            .into_iter()
            .collect();
        let grouped = vec![Theme::new("조선", vec![stock("한화오션", 2.0, 100.0), stock("삼성중공업", 1.0, 100.0)])];
        let core = selector().select_core(&grouped, &pool, 7);
        let names: HashSet<&str> = core[0].stocks.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(core[0].stocks.len(), 4);
        assert!(names.contains("HD현대중공업"));
        assert!(names.contains("조선선재"));
    }

    #[test]
    fn test_specials_and_total_cap() {
        let pool: StockPool = vec![
            stock("서남", 18.0, 300.0),
            stock("에이피알", 12.0, 200.0),
            stock("신규주", 4.0, 80.0).with_code("999990"),
        ]
        .into_iter()
        .collect();
        let grouped = vec![
            Theme::new("조선", vec![stock("한화오션", 2.0, 100.0), stock("삼성중공업", 1.0, 100.0)]),
            Theme::new("게임", vec![stock("크래프톤", 3.0, 500.0), stock("넷마블", 1.0, 200.0)]),
            Theme::new("화장품", vec![stock("아모레퍼시픽", 2.0, 300.0)]),
        ];
        let ipos = vec![
            IpoListing { stock: stock("신규주", 0.0, 0.0).with_code("999990"), listed_on: today() - Duration::days(3) },
            IpoListing { stock: stock("오래된주", 5.0, 100.0), listed_on: today() - Duration::days(90) },
        ];

        let result = selector().select_final(&grouped, &ipos, &pool, limits(7, 10), today());
        let names: Vec<&str> = result.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["조선", INDIVIDUAL_ISSUE, NEW_LISTING, OTHER_SECTOR]);

        let issue = &result[1];
        assert_eq!(issue.stocks[0].name, "서남");
        assert!(issue.is_special);

        let ipo = &result[2];
        assert_eq!(ipo.stocks.len(), 1);
        assert_eq!(ipo.stocks[0].rate, 4.0);
        assert!(ipo.stocks[0].is_ipo);

        let other = &result[3];
        assert_eq!(other.headline, "기타 테마 통합 (게임, 화장품)");
        assert!(other.stocks.iter().all(|s| s.source_theme.is_some()));

        let capped = selector().select_final(&grouped, &ipos, &pool, limits(7, 2), today());
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_individual_issue_takes_every_leftover() {
        let pool: StockPool = vec![stock("한화오션", 2.0, 100.0), stock("우리기술", 2.5, 60.0), stock("대한전선", -1.0, 90.0)]
            .into_iter()
            .collect();
        let grouped = vec![
            Theme::new("조선", vec![stock("한화오션", 2.0, 100.0), stock("삼성중공업", 1.0, 100.0)]),
            Theme::special(INDIVIDUAL_ISSUE, String::new(), vec![stock("에이피알", 1.2, 40.0)]),
        ];

        let issue = selector().individual_issue_theme(&grouped, &pool).unwrap();
        let names: Vec<&str> = issue.stocks.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["우리기술", "에이피알", "대한전선"]);
        assert_eq!(issue.headline, "우리기술 +2.5% 등 개별 종목 3개 강세");
    }

    #[test]
    fn test_zero_special_budget_yields_no_buckets() {
        let mut config = PipelineConfig::default();
        config.special_max_stocks = 0;
        config.ipo.max_stocks = 0;
        let selector = ThemeSelector::new(Arc::new(ThemeTaxonomy::builtin()), config);

        let pool: StockPool = vec![stock("서남", 18.0, 300.0)].into_iter().collect();
        let ipos = vec![IpoListing { stock: stock("신규주", 6.0, 90.0), listed_on: today() }];
        let grouped = vec![Theme::new("게임", vec![stock("크래프톤", 3.0, 500.0)])];

        assert!(selector.individual_issue_theme(&grouped, &pool).is_none());
        assert!(selector.new_listing_theme(&ipos, &pool, today()).is_none());
        let result = selector.select_final(&grouped, &ipos, &pool, limits(7, 10), today());
        assert!(result.iter().all(|t| !t.stocks.is_empty()));
    }

    #[test]
    fn test_no_duplicate_identity_after_selection() {
        let dup = stock("에코프로", 5.0, 900.0).with_code("086520");
        let grouped = vec![Theme::new(
            "2차전지",
            vec![dup.clone(), stock("금양", 8.0, 300.0), stock("엘앤에프", 3.0, 200.0)],
        )];
        let pool: StockPool = vec![dup, stock("에코프로", 5.5, 950.0)].into_iter().collect();
        let result = selector().select_final(&grouped, &[], &pool, limits(7, 10), today());

        for theme in &result {
            let mut seen = HashSet::new();
            for s in &theme.stocks {
                let key = s.code.clone().unwrap_or_else(|| s.name.clone());
                assert!(seen.insert(key), "duplicate {} in {}", s.name, theme.name);
            }
        }
    }
}
