use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use ai_classifier::ClassifierConfig;
use theme_core::ThemeTaxonomy;
use theme_engine::{BatchConfig, PipelineConfig};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,

    // Market-data gateway
    pub market_data_url: String,
    pub market_data_rate_limit: usize,     // requests per minute

    // AI classifier (disabled without a key)
    pub classifier_url: String,
    pub classifier_api_key: Option<String>,
    pub classifier_model: String,

    // Scheduler
    pub rebuild_interval_seconds: u64,     // 300 (5 minutes)
    pub refresh_interval_seconds: u64,     // 10

    // Selection
    pub max_core_themes: usize,            // 7
    pub max_total_themes: usize,           // 10
    pub max_grouped_themes: usize,         // 20
    pub ipo_window_days: u32,              // 30

    // Batched fetches
    pub fetch_batch_size: usize,           // 5
    pub fetch_batch_delay_ms: u64,         // 500

    pub taxonomy_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            port: var("PORT", "3000").parse().context("PORT must be a port number")?,

            market_data_url: var("MARKET_DATA_URL", "http://localhost:8080"),
            market_data_rate_limit: var("MARKET_DATA_RATE_LIMIT", "300")
                .parse()
                .context("MARKET_DATA_RATE_LIMIT must be an integer")?,

            classifier_url: var("CLASSIFIER_URL", "http://localhost:8090/v1/complete"),
            classifier_api_key: lookup("CLASSIFIER_API_KEY").filter(|k| !k.trim().is_empty()),
            classifier_model: var("CLASSIFIER_MODEL", "gemini-2.0-flash"),

            rebuild_interval_seconds: var("THEME_REBUILD_INTERVAL", "300")
                .parse()
                .context("THEME_REBUILD_INTERVAL must be seconds")?,
            refresh_interval_seconds: var("PRICE_REFRESH_INTERVAL", "10")
                .parse()
                .context("PRICE_REFRESH_INTERVAL must be seconds")?,

            max_core_themes: var("MAX_CORE_THEMES", "7").parse().context("MAX_CORE_THEMES")?,
            max_total_themes: var("MAX_TOTAL_THEMES", "10").parse().context("MAX_TOTAL_THEMES")?,
            max_grouped_themes: var("MAX_GROUPED_THEMES", "20").parse().context("MAX_GROUPED_THEMES")?,
            ipo_window_days: var("IPO_WINDOW_DAYS", "30").parse().context("IPO_WINDOW_DAYS")?,

            fetch_batch_size: var("FETCH_BATCH_SIZE", "5").parse().context("FETCH_BATCH_SIZE")?,
            fetch_batch_delay_ms: var("FETCH_BATCH_DELAY_MS", "500")
                .parse()
                .context("FETCH_BATCH_DELAY_MS")?,

            taxonomy_path: lookup("TAXONOMY_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_core_themes == 0 || self.max_core_themes > self.max_total_themes {
            bail!(
                "MAX_CORE_THEMES ({}) must be between 1 and MAX_TOTAL_THEMES ({})",
                self.max_core_themes,
                self.max_total_themes
            );
        }
        if self.fetch_batch_size == 0 {
            bail!("FETCH_BATCH_SIZE must be at least 1");
        }
        if self.rebuild_interval_seconds == 0 || self.refresh_interval_seconds == 0 {
            bail!("Scheduler intervals must be positive");
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig {
            max_core_themes: self.max_core_themes,
            max_total_themes: self.max_total_themes,
            max_grouped_themes: self.max_grouped_themes,
            batch: BatchConfig {
                size: self.fetch_batch_size,
                delay: Duration::from_millis(self.fetch_batch_delay_ms),
            },
            ..PipelineConfig::default()
        };
        config.ipo.window_days = self.ipo_window_days;
        config
    }

    pub fn classifier_config(&self) -> Option<ClassifierConfig> {
        let key = self.classifier_api_key.as_ref()?;
        let mut config = ClassifierConfig::new(&self.classifier_url, key);
        config.model = self.classifier_model.clone();
        Some(config)
    }

    /// Built-in taxonomy unless `TAXONOMY_PATH` points at a JSON override.
    pub fn load_taxonomy(&self) -> Result<ThemeTaxonomy> {
        match &self.taxonomy_path {
            Some(path) => ThemeTaxonomy::load(path)
                .with_context(|| format!("Failed to load taxonomy from {}", path.display())),
            None => Ok(ThemeTaxonomy::builtin()),
        }
    }

    pub fn rebuild_interval(&self) -> Duration {
        Duration::from_secs(self.rebuild_interval_seconds)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.rebuild_interval(), Duration::from_secs(300));
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
        assert!(config.classifier_config().is_none());
        assert!(config.load_taxonomy().is_ok());

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.max_core_themes, 7);
        assert_eq!(pipeline.max_total_themes, 10);
        assert_eq!(pipeline.max_grouped_themes, 20);
        assert_eq!(pipeline.batch.size, 5);
        assert_eq!(pipeline.batch.delay, Duration::from_millis(500));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("MAX_CORE_THEMES", "5"),
            ("IPO_WINDOW_DAYS", "14"),
            ("CLASSIFIER_API_KEY", "secret"),
            ("CLASSIFIER_MODEL", "gemini-1.5-pro"),
        ])
        .unwrap();

        assert_eq!(config.pipeline_config().max_core_themes, 5);
        assert_eq!(config.pipeline_config().ipo.window_days, 14);
        let classifier = config.classifier_config().unwrap();
        assert_eq!(classifier.api_key, "secret");
        assert_eq!(classifier.model, "gemini-1.5-pro");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("PORT", "http")]).is_err());
        assert!(config_from(&[("MAX_CORE_THEMES", "12")]).is_err());
        assert!(config_from(&[("FETCH_BATCH_SIZE", "0")]).is_err());
        assert!(config_from(&[("CLASSIFIER_API_KEY", "  ")]).unwrap().classifier_config().is_none());
    }

    #[test]
    fn test_missing_taxonomy_file() {
        let config = config_from(&[("TAXONOMY_PATH", "/nonexistent/taxonomy.json")]).unwrap();
        assert!(config.load_taxonomy().is_err());
    }
}
