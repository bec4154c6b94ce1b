use std::sync::Arc;

use theme_engine::PipelineResult;
use tokio::sync::watch;

/// Holder of the published theme set.
///
/// The scheduler is the only writer; handlers read the latest snapshot
/// through cheap `Arc` clones and never observe a half-written result.
#[derive(Clone)]
pub struct ThemeStore {
    tx: Arc<watch::Sender<Arc<PipelineResult>>>,
}

impl ThemeStore {
    pub fn new(initial: PipelineResult) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Arc<PipelineResult> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PipelineResult>> {
        self.tx.subscribe()
    }

    /// Replace the published set with a rebuild result.
    pub fn publish(&self, result: PipelineResult) {
        self.tx.send_replace(Arc::new(result));
    }

    /// Publish a price refresh, but only over the same theme set it was
    /// computed from. Returns false when a rebuild landed in between.
    pub fn publish_refresh(&self, result: PipelineResult) -> bool {
        let mut result = Some(result);
        self.tx.send_if_modified(|current| {
            if current.version != result.as_ref().map_or(0, |r| r.version) {
                return false;
            }
            match result.take() {
                Some(r) => {
                    *current = Arc::new(r);
                    true
                }
                None => false,
            }
        })
    }
}
