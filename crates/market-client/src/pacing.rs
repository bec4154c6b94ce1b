//! Request pacing for the gateway quota.
//!
//! Cell-rate style: a full minute's quota may go out at once, after which
//! requests are released one emission interval apart.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant};

const QUOTA_WINDOW: Duration = Duration::from_secs(60);

pub(crate) struct RequestPacer {
    emission: Duration,
    burst: Duration,
    /// Theoretical arrival time of the next request
    next_arrival: Mutex<Instant>,
}

impl RequestPacer {
    pub(crate) fn per_minute(quota: usize) -> Self {
        let quota = u32::try_from(quota.max(1)).unwrap_or(u32::MAX);
        let emission = QUOTA_WINDOW / quota;
        Self {
            emission,
            burst: QUOTA_WINDOW.saturating_sub(emission),
            next_arrival: Mutex::new(Instant::now()),
        }
    }

    /// Reserve the next slot and sleep until it opens.
    pub(crate) async fn wait_turn(&self) {
        let now = Instant::now();
        let release_at = {
            let mut next_arrival = self.next_arrival.lock().await;
            let arrival = (*next_arrival).max(now);
            *next_arrival = arrival + self.emission;
            arrival.checked_sub(self.burst).map_or(now, |t| t.max(now))
        };

        if release_at > now {
            tracing::debug!(
                "Gateway quota reached, holding request for {:.1}s",
                (release_at - now).as_secs_f64()
            );
            time::sleep_until(release_at).await;
        }
    }
}
