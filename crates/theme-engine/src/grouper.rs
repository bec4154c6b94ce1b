//! Theme consolidation and corporate-group detection.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use theme_core::{
    dedup_latest, default_headline, is_reserved_name, round2, scoring, StockPool, StockSnapshot, Theme, ThemeTaxonomy,
};

pub struct ThemeGrouper {
    taxonomy: Arc<ThemeTaxonomy>,
    max_stocks_per_theme: usize,
    hot_rate: f64,
}

struct Consolidated {
    name: String,
    pool: StockPool,
    source_themes: Vec<String>,
    headline: Option<String>,
    is_hot: bool,
    is_special: bool,
    is_new_issue: bool,
}

impl ThemeGrouper {
    pub fn new(taxonomy: Arc<ThemeTaxonomy>, max_stocks_per_theme: usize, hot_rate: f64) -> Self {
        Self {
            taxonomy,
            max_stocks_per_theme,
            hot_rate,
        }
    }

    /// Collapse near-duplicate names, add conglomerate themes, order, and cap at `max_themes`.
    pub fn group(&self, themes: Vec<Theme>, max_themes: usize) -> Vec<Theme> {
        let input_count = themes.len();
        let all_stocks = dedup_latest(themes.iter().flat_map(|t| t.stocks.iter().cloned()).collect());

        let mut order: Vec<Consolidated> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for theme in themes {
            let canonical = self.taxonomy.canonical_name(&theme.name);
            let idx = *index.entry(canonical.clone()).or_insert_with(|| {
                order.push(Consolidated {
                    name: canonical.clone(),
                    pool: StockPool::new(),
                    source_themes: Vec::new(),
                    headline: None,
                    is_hot: false,
                    is_special: is_reserved_name(&canonical),
                    is_new_issue: true,
                });
                order.len() - 1
            });

            let group = &mut order[idx];
            if theme.is_hot && group.headline.is_none() {
                group.headline = Some(theme.headline.clone());
            }
            group.is_hot |= theme.is_hot;
            group.is_special |= theme.is_special;
            group.is_new_issue &= theme.is_new_issue;
            group.source_themes.push(theme.name);
            group.pool.extend(theme.stocks);
        }

        let mut result: Vec<Theme> = order.into_iter().map(|g| self.finish(g)).collect();

        for theme in self.detect_conglomerates(&all_stocks) {
            if !result.iter().any(|t| t.name == theme.name) {
                result.push(theme);
            }
        }

        self.sort_by_priority(&mut result);
        result.truncate(max_themes);

        tracing::info!(
            "📚 Grouped {} themes into {} (conglomerates: {})",
            input_count,
            result.len(),
            result.iter().filter(|t| t.is_conglomerate).map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        result
    }

    fn finish(&self, group: Consolidated) -> Theme {
        let mut stocks = group.pool.into_vec();
        sort_by_momentum(&mut stocks);
        stocks.truncate(self.max_stocks_per_theme);

        let mut theme = Theme::new(group.name, stocks);
        if let Some(headline) = group.headline {
            theme.headline = headline;
        }
        theme.is_hot = group.is_hot;
        theme.is_special = group.is_special;
        theme.is_new_issue = group.is_new_issue && !group.is_special;
        theme.source_themes = group.source_themes;
        theme
    }

    /// Corporate groups with at least two members among the pooled stocks.
    pub fn detect_conglomerates(&self, pooled: &[StockSnapshot]) -> Vec<Theme> {
        let mut detected = Vec::new();

        for group in &self.taxonomy.conglomerates {
            let mut members: Vec<StockSnapshot> = Vec::new();
            for stock in pooled.iter().filter(|s| group.members.contains(&s.name)) {
                if !members.iter().any(|m| m.name == stock.name) {
                    members.push(stock.clone());
                }
            }

            if members.len() < 2 {
                continue;
            }

            let avg_rate = round2(scoring::average_rate(&members));
            let count = members.len();
            sort_by_momentum(&mut members);
            members.truncate(self.max_stocks_per_theme);

            let mut theme = Theme::new(group.name.clone(), members);
            theme.is_conglomerate = true;
            theme.is_hot = avg_rate > self.hot_rate;
            theme.headline = format!("{} {}개 종목 평균 {:+}%", group.name, count, avg_rate);
            tracing::debug!("[Conglomerate] {}: {} members, avg {:+.2}%", group.name, count, avg_rate);
            detected.push(theme);
        }

        detected
    }

    fn sort_by_priority(&self, themes: &mut [Theme]) {
        themes.sort_by(|a, b| {
            let lead_a = a.is_conglomerate || a.is_hot;
            let lead_b = b.is_conglomerate || b.is_hot;
            lead_b
                .cmp(&lead_a)
                .then_with(|| {
                    match (self.taxonomy.priority_index(&a.name), self.taxonomy.priority_index(&b.name)) {
                        (Some(x), Some(y)) => x.cmp(&y),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    }
                })
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        });
    }
}

/// rate + amount/100, strongest first
pub(crate) fn sort_by_momentum(stocks: &mut [StockSnapshot]) {
    stocks.sort_by(|a, b| {
        b.momentum_weight()
            .partial_cmp(&a.momentum_weight())
            .unwrap_or(Ordering::Equal)
    });
}

/// Headline for a theme whose stocks changed after grouping
pub(crate) fn regenerate_headline(theme: &mut Theme) {
    if !theme.is_hot && !theme.is_conglomerate {
        theme.headline = default_headline(&theme.name, &theme.stocks);
    }
}
