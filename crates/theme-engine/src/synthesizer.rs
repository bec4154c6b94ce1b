//! Base theme construction from the sector taxonomy, plus AI label merging.

use std::collections::HashSet;
use std::sync::Arc;

use theme_core::{
    default_headline, dedup_latest, is_noise, is_reserved_name, CandidateSource, QuoteProvider,
    SectorDefinition, StockPool, StockSnapshot, Theme, ThemeCandidate, ThemeTaxonomy,
};

use crate::batch::fetch_quotes;
use crate::config::PipelineConfig;

pub struct ThemeSynthesizer {
    taxonomy: Arc<ThemeTaxonomy>,
    quotes: Arc<dyn QuoteProvider>,
    config: PipelineConfig,
}

struct SectorMatch<'t> {
    sector: &'t SectorDefinition,
    stocks: Vec<StockSnapshot>,
}

impl ThemeSynthesizer {
    pub fn new(taxonomy: Arc<ThemeTaxonomy>, quotes: Arc<dyn QuoteProvider>, config: PipelineConfig) -> Self {
        Self { taxonomy, quotes, config }
    }

    /// Taxonomy themes, topped up with representatives, with AI suggestions merged in.
    /// Never fails: an empty suggestion list yields taxonomy-only themes.
    pub async fn synthesize(&self, pool: &StockPool, suggestions: &[ThemeCandidate]) -> Vec<Theme> {
        let base = self.taxonomy_themes(pool).await;
        let base_count = base.len();
        let merged = self.merge_ai_themes(base, suggestions, pool).await;

        tracing::info!(
            "🧩 Synthesized {} themes ({} from taxonomy, {} AI suggestions)",
            merged.len(),
            base_count,
            suggestions.len()
        );
        merged
    }

    fn match_sectors(&self, pool: &StockPool) -> Vec<SectorMatch<'_>> {
        self.taxonomy
            .sectors
            .iter()
            .map(|sector| {
                let mut stocks: Vec<StockSnapshot> = pool
                    .iter()
                    .filter(|s| !is_noise(&s.name))
                    .filter(|s| sector.matches_stock(&s.name) || s.sector_hint.as_deref() == Some(sector.name.as_str()))
                    .cloned()
                    .collect();
                stocks.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(std::cmp::Ordering::Equal));
                stocks.truncate(self.config.taxonomy_stocks_per_theme);
                SectorMatch { sector, stocks }
            })
            .collect()
    }

    /// Steps 1 and 2: keyword/roster matching, then a live top-up of missing
    /// representative stocks for every sector that will be emitted.
    pub async fn taxonomy_themes(&self, pool: &StockPool) -> Vec<Theme> {
        let mut matches: Vec<SectorMatch<'_>> = self
            .match_sectors(pool)
            .into_iter()
            .filter(|m| m.stocks.len() >= self.config.min_taxonomy_matches || m.sector.major)
            .collect();

        // (match index, representative name) still missing after matching
        let mut wanted: Vec<(usize, String)> = Vec::new();
        for (idx, m) in matches.iter_mut().enumerate() {
            let present = m.stocks.iter().filter(|s| m.sector.is_representative(&s.name)).count();
            if present >= self.config.min_representatives {
                continue;
            }
            let needed = self.config.min_representatives - present;
            let missing: Vec<String> = m
                .sector
                .representative_stocks
                .iter()
                .filter(|name| !m.stocks.iter().any(|s| &s.name == *name))
                .take(needed)
                .cloned()
                .collect();

            for name in missing {
                // Representatives trimmed by the top-N cut are reused from the pool
                match pool.get(&name) {
                    Some(stock) => m.stocks.push(stock.clone()),
                    None => wanted.push((idx, name)),
                }
            }
        }

        if !wanted.is_empty() {
            let mut keys: Vec<String> = wanted.iter().map(|(_, n)| n.clone()).collect();
            keys.sort();
            keys.dedup();

            let fetched: StockPool = fetch_quotes(self.quotes.as_ref(), &keys, &self.config.batch)
                .await
                .into_iter()
                .filter(|q| q.price > 0.0)
                .collect();

            for (idx, name) in &wanted {
                if let Some(quote) = fetched.get(name) {
                    let mut stock = quote.clone();
                    stock.sector_hint = Some(matches[*idx].sector.name.clone());
                    tracing::debug!("Force added {} to {} ({:+.2}%)", stock.name, matches[*idx].sector.name, stock.rate);
                    matches[*idx].stocks.push(stock);
                }
            }
        }

        matches
            .into_iter()
            .filter(|m| {
                let min = if m.sector.major { 1 } else { self.config.min_taxonomy_matches };
                m.stocks.len() >= min
            })
            .map(|m| Theme::new(m.sector.name.clone(), dedup_latest(m.stocks)))
            .collect()
    }

    fn find_match(&self, themes: &[Theme], label: &str) -> Option<usize> {
        let lower = label.trim().to_lowercase();
        themes.iter().position(|t| {
            if is_reserved_name(&t.name) {
                return t.name == label;
            }
            let name = t.name.to_lowercase();
            name == lower || name.contains(&lower) || lower.contains(&name) || self.taxonomy.is_similar(&t.name, label)
        })
    }

    /// Step 3: fold AI suggestions into the base set.
    pub async fn merge_ai_themes(
        &self,
        mut themes: Vec<Theme>,
        suggestions: &[ThemeCandidate],
        pool: &StockPool,
    ) -> Vec<Theme> {
        if suggestions.is_empty() {
            return themes;
        }

        let lookup = self.resolve_suggested_stocks(suggestions, pool).await;

        for suggestion in suggestions {
            let label = suggestion.name.trim();
            if label.is_empty() {
                continue;
            }

            let stocks: Vec<StockSnapshot> = suggestion
                .stocks
                .iter()
                .filter(|name| !is_noise(name))
                .filter_map(|name| lookup.get(name).cloned())
                .filter(|s| self.config.passes_momentum(s.rate, s.amount))
                .collect();

            match self.find_match(&themes, label) {
                Some(idx) => {
                    let theme = &mut themes[idx];
                    if let Some(headline) = suggestion.headline.as_ref().filter(|h| !h.trim().is_empty()) {
                        theme.headline = headline.clone();
                    }
                    theme.is_hot = true;
                    // A fresher snapshot of a stock already in the theme replaces it
                    let existing = std::mem::take(&mut theme.stocks);
                    theme.stocks = dedup_latest(existing.into_iter().chain(stocks).collect());
                    theme.recompute();
                    tracing::debug!("[Match] \"{}\" -> \"{}\" (hot)", label, theme.name);
                }
                None if !stocks.is_empty() => {
                    let mut theme = Theme::new(label, dedup_latest(stocks));
                    theme.headline = suggestion
                        .headline
                        .clone()
                        .filter(|h| !h.trim().is_empty())
                        .unwrap_or_else(|| default_headline(label, &theme.stocks));
                    if is_reserved_name(label) {
                        theme.is_special = true;
                    } else {
                        theme.is_hot = true;
                        theme.is_new_issue = true;
                    }
                    tracing::debug!("[New Issue] \"{}\" added with {} stocks", label, theme.stocks.len());
                    themes.push(theme);
                }
                None => {
                    tracing::debug!("Dropped AI theme \"{}\": no tradable stocks", label);
                }
            }
        }

        themes.retain(|t| !t.stocks.is_empty());
        themes
    }

    /// Resolve every suggested stock name against the pool, quoting the rest live.
    async fn resolve_suggested_stocks(&self, suggestions: &[ThemeCandidate], pool: &StockPool) -> StockPool {
        let mut seen = HashSet::new();
        let unresolved: Vec<String> = suggestions
            .iter()
            .flat_map(|s| s.stocks.iter())
            .filter(|name| !is_noise(name) && pool.get(name).is_none())
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();

        let mut lookup = pool.clone();
        if !unresolved.is_empty() {
            let quotes = fetch_quotes(self.quotes.as_ref(), &unresolved, &self.config.batch).await;
            tracing::debug!("Resolved {}/{} AI-suggested stocks via live quotes", quotes.len(), unresolved.len());
            lookup.extend(quotes.into_iter().map(|mut q| {
                q.source = CandidateSource::Quote;
                q
            }));
        }
        lookup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::time::Duration;

    struct MapQuotes(HashMap<String, StockSnapshot>);

    #[async_trait]
    impl QuoteProvider for MapQuotes {
        async fn get_quote(&self, key: &str) -> Option<StockSnapshot> {
            self.0.get(key).cloned()
        }
    }

    fn quotes(entries: &[(&str, f64, f64)]) -> Arc<dyn QuoteProvider> {
        Arc::new(MapQuotes(
            entries
                .iter()
                .map(|(n, r, a)| {
                    (n.to_string(), StockSnapshot::new(*n, *r, *a, CandidateSource::Quote).with_price(10_000.0))
                })
                .collect(),
        ))
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.batch.delay = Duration::ZERO;
        config
    }

    fn hot(name: &str, rate: f64, amount: f64) -> StockSnapshot {
        StockSnapshot::new(name, rate, amount, CandidateSource::HotMovers).with_price(1_000.0)
    }

    #[tokio::test]
    async fn test_non_major_sector_needs_two_matches() {
        let synth = ThemeSynthesizer::new(Arc::new(ThemeTaxonomy::builtin()), quotes(&[]), config());
        let pool: StockPool = vec![hot("한화오션", 6.0, 900.0)].into_iter().collect();

        let themes = synth.taxonomy_themes(&pool).await;
        assert!(themes.iter().all(|t| t.name != "조선"));

        let pool: StockPool = vec![hot("한화오션", 6.0, 900.0), hot("삼성중공업", 4.0, 500.0)].into_iter().collect();
        let themes = synth.taxonomy_themes(&pool).await;
        assert!(themes.iter().any(|t| t.name == "조선"));
    }

    #[tokio::test]
    async fn test_major_sector_topped_up_from_live_quotes() {
        let synth = ThemeSynthesizer::new(
            Arc::new(ThemeTaxonomy::builtin()),
            quotes(&[("에코프로", 1.2, 800.0), ("에코프로비엠", 0.8, 600.0), ("LG에너지솔루션", -0.3, 1200.0)]),
            config(),
        );
        let pool = StockPool::new();

        let themes = synth.taxonomy_themes(&pool).await;
        let battery = themes.iter().find(|t| t.name == "2차전지").expect("major sector emitted");
        assert_eq!(battery.stocks.len(), 3);
        assert!(battery.stocks.iter().all(|s| s.sector_hint.as_deref() == Some("2차전지")));
        assert!(!battery.is_hot);
    }

    #[tokio::test]
    async fn test_sector_hint_counts_as_match() {
        let synth = ThemeSynthesizer::new(Arc::new(ThemeTaxonomy::builtin()), quotes(&[]), config());
        let pool: StockPool = vec![
            hot("에스피시스템스", 12.0, 300.0).with_sector("로봇"),
            hot("로보티즈", 8.0, 200.0),
        ]
        .into_iter()
        .collect();

        let themes = synth.taxonomy_themes(&pool).await;
        let robots = themes.iter().find(|t| t.name == "로봇").unwrap();
        assert!(robots.stocks.iter().any(|s| s.name == "에스피시스템스"));
    }

    #[tokio::test]
    async fn test_ai_merge_marks_hot_and_adds_stocks() {
        let synth = ThemeSynthesizer::new(Arc::new(ThemeTaxonomy::builtin()), quotes(&[("피엔티", 9.0, 150.0)]), config());
        let pool: StockPool = vec![hot("에코프로", 5.0, 900.0), hot("금양", 11.0, 400.0)].into_iter().collect();
        let base = vec![Theme::new("2차전지", pool.as_slice().to_vec())];

        let suggestions = vec![ThemeCandidate {
            name: "배터리".to_string(),
            headline: Some("전고체 기대감에 배터리주 급등".to_string()),
            stocks: vec!["금양".to_string(), "피엔티".to_string(), "에코프로우".to_string()],
        }];

        let merged = synth.merge_ai_themes(base, &suggestions, &pool).await;
        assert_eq!(merged.len(), 1);
        let theme = &merged[0];
        assert!(theme.is_hot);
        assert_eq!(theme.headline, "전고체 기대감에 배터리주 급등");
        assert_eq!(theme.stocks.len(), 3);
        assert!(theme.stocks.iter().all(|s| !is_noise(&s.name)));
    }

    #[tokio::test]
    async fn test_ai_merge_replaces_stale_member() {
        let synth = ThemeSynthesizer::new(Arc::new(ThemeTaxonomy::builtin()), quotes(&[]), config());
        let stale = hot("금양", 4.0, 300.0).fetched_at(Utc::now() - chrono::Duration::seconds(90));
        let base = vec![Theme::new("2차전지", vec![hot("에코프로", 5.0, 900.0), stale])];
        let pool: StockPool = vec![hot("금양", 13.0, 700.0)].into_iter().collect();

        let suggestions = vec![ThemeCandidate {
            name: "2차전지".to_string(),
            headline: None,
            stocks: vec!["금양".to_string()],
        }];

        let merged = synth.merge_ai_themes(base, &suggestions, &pool).await;
        let theme = &merged[0];
        assert_eq!(theme.stocks.len(), 2);
        let geumyang: Vec<&StockSnapshot> = theme.stocks.iter().filter(|s| s.name == "금양").collect();
        assert_eq!(geumyang.len(), 1);
        assert_eq!(geumyang[0].rate, 13.0);
        assert_eq!(theme.top_stock().map(|s| s.name.as_str()), Some("금양"));
    }

    #[tokio::test]
    async fn test_unmatched_ai_theme_needs_a_real_stock() {
        let synth = ThemeSynthesizer::new(Arc::new(ThemeTaxonomy::builtin()), quotes(&[("서남", 15.0, 300.0)]), config());
        let pool = StockPool::new();

        let suggestions = vec![
            ThemeCandidate {
                name: "초전도체".to_string(),
                headline: None,
                stocks: vec!["서남".to_string(), "신성델타테크".to_string()],
            },
            ThemeCandidate {
                name: "스팩 테마".to_string(),
                headline: None,
                stocks: vec!["KB스팩30호".to_string()],
            },
        ];

        let merged = synth.merge_ai_themes(Vec::new(), &suggestions, &pool).await;
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "초전도체");
        assert!(merged[0].is_new_issue && merged[0].is_hot);
        assert_eq!(merged[0].stocks.len(), 1);
    }
}
