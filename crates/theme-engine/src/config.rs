use std::time::Duration;

use crate::batch::BatchConfig;
use crate::retry::RetryPolicy;

/// When a strong, crowded theme is broken into numbered parts
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub min_stocks_to_split: usize,
    pub stocks_per_part: usize,
    pub max_parts: usize,
    pub min_score_to_split: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            min_stocks_to_split: 6,
            stocks_per_part: 5,
            max_parts: 3,
            min_score_to_split: 5.0,
        }
    }
}

/// New-listing bucket filter
#[derive(Debug, Clone)]
pub struct IpoThemeConfig {
    pub window_days: u32,
    pub min_rate: f64,
    pub min_amount: f64,
    pub max_stocks: usize,
}

impl Default for IpoThemeConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            min_rate: -5.0,
            min_amount: 50.0,
            max_stocks: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_core_themes: usize,
    pub max_total_themes: usize,
    pub max_grouped_themes: usize,

    // Synthesizer
    pub taxonomy_stocks_per_theme: usize,
    pub min_taxonomy_matches: usize,
    pub min_representatives: usize,
    /// AI-suggested stocks must be rising, or a high-value dip
    pub min_momentum_rate: f64,
    pub dip_min_rate: f64,
    pub dip_min_amount: f64,

    // Grouper
    pub max_stocks_per_group: usize,
    pub conglomerate_hot_rate: f64,

    // Selector
    pub min_core_stocks: usize,
    pub special_max_stocks: usize,
    pub split: SplitConfig,
    pub ipo: IpoThemeConfig,

    pub hot_stock_limit: usize,
    pub batch: BatchConfig,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_core_themes: 7,
            max_total_themes: 10,
            max_grouped_themes: 20,
            taxonomy_stocks_per_theme: 5,
            min_taxonomy_matches: 2,
            min_representatives: 3,
            min_momentum_rate: 0.0,
            dip_min_rate: -10.0,
            dip_min_amount: 300.0,
            max_stocks_per_group: 10,
            conglomerate_hot_rate: 3.0,
            min_core_stocks: 4,
            special_max_stocks: 5,
            split: SplitConfig::default(),
            ipo: IpoThemeConfig::default(),
            hot_stock_limit: 100,
            batch: BatchConfig {
                size: 5,
                delay: Duration::from_millis(500),
            },
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Rising, or a dip with enough traded value to still matter
    pub fn passes_momentum(&self, rate: f64, amount: f64) -> bool {
        rate >= self.min_momentum_rate || (rate >= self.dip_min_rate && amount >= self.dip_min_amount)
    }
}
