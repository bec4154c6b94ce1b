//! Periodic theme rebuild and price refresh.
//!
//! Both loops run independently. Each cycle executes in its own task so a
//! failing or panicking cycle is logged and the published set stays as is.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use theme_engine::ThemePipeline;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::store::ThemeStore;

pub struct Scheduler {
    pipeline: Arc<ThemePipeline>,
    store: ThemeStore,
    rebuild_every: Duration,
    refresh_every: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Arc<ThemePipeline>, store: ThemeStore, rebuild_every: Duration, refresh_every: Duration) -> Self {
        Self {
            pipeline,
            store,
            rebuild_every,
            refresh_every,
        }
    }

    /// Run one full rebuild and publish it. Returns whether a new set was published.
    pub async fn rebuild_once(&self) -> bool {
        let previous = self.store.current();
        let pipeline = self.pipeline.clone();
        let cycle = tokio::spawn(async move { pipeline.run_cycle(Some(previous.as_ref())).await });

        match cycle.await {
            Ok(Ok(result)) => {
                tracing::info!(
                    "Published theme set v{} ({} themes, {} hot stocks)",
                    result.version,
                    result.themes.len(),
                    result.hot_stocks.len()
                );
                self.store.publish(result);
                true
            }
            Ok(Err(e)) => {
                tracing::error!("Theme rebuild failed, keeping v{}: {}", self.store.current().version, e);
                false
            }
            Err(e) => {
                tracing::error!("Theme rebuild task aborted, keeping v{}: {}", self.store.current().version, e);
                false
            }
        }
    }

    /// Re-quote the published set. Skipped until a first rebuild has landed.
    pub async fn refresh_once(&self) -> bool {
        let previous = self.store.current();
        if previous.version == 0 || previous.themes.is_empty() {
            tracing::debug!("Price refresh skipped: nothing published yet");
            return false;
        }

        let pipeline = self.pipeline.clone();
        let cycle = tokio::spawn(async move { pipeline.refresh_prices(previous.as_ref(), Utc::now()).await });

        match cycle.await {
            Ok(result) => {
                let version = result.version;
                let published = self.store.publish_refresh(result);
                if !published {
                    tracing::debug!("Discarded price refresh for v{}: a rebuild landed first", version);
                }
                published
            }
            Err(e) => {
                tracing::error!("Price refresh task aborted: {}", e);
                false
            }
        }
    }

    /// Start both loops. The rebuild fires immediately; refreshes follow on
    /// their own interval.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let scheduler = Arc::new(self);
        tracing::info!(
            "Scheduler started: rebuild every {}s, price refresh every {}s",
            scheduler.rebuild_every.as_secs(),
            scheduler.refresh_every.as_secs()
        );

        let rebuild = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                let mut interval = time::interval(scheduler.rebuild_every);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    scheduler.rebuild_once().await;
                }
            })
        };

        let refresh = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + scheduler.refresh_every, scheduler.refresh_every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                scheduler.refresh_once().await;
            }
        });

        vec![rebuild, refresh]
    }
}
