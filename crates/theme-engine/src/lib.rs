pub mod batch;
pub mod config;
pub mod grouper;
pub mod news_extract;
pub mod pipeline;
pub mod retry;
pub mod selector;
pub mod star_rater;
pub mod supply;
pub mod synthesizer;

pub use batch::{batched, fetch_quotes, BatchConfig};
pub use config::{IpoThemeConfig, PipelineConfig, SplitConfig};
pub use grouper::ThemeGrouper;
pub use news_extract::extract_stock_mentions;
pub use pipeline::{CycleInputs, PipelineDeps, PipelineResult, ThemePipeline};
pub use retry::RetryPolicy;
pub use selector::{SelectionLimits, ThemeSelector};
pub use star_rater::{StarRater, StarRating, LIMIT_UP_RATE};
pub use supply::apply_supply_adjustments;
pub use synthesizer::ThemeSynthesizer;
