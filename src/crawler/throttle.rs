//! Crawl-wide fetch throttle
//!
//! Every network fetch in the process waits on one shared cadence, regardless of
//! domain or of which crawl loop issues it.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct FetchThrottle {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl FetchThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits until the caller may start a fetch
    ///
    /// Each caller reserves the next free slot under the lock and then sleeps
    /// outside it, so no two fetch starts are closer than `interval`.
    pub async fn acquire(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next_slot = Some(slot + self.interval);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            tracing::trace!("Throttling fetch for {:?}", wait);
        }
        tokio::time::sleep_until(slot).await;
    }
}
