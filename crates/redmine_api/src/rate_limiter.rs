//! Async request pacing shared by every call a client makes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Spaces consecutive Redmine requests at least `cooldown` apart so paginated
/// listings do not hammer the server. Clones share one schedule.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Waits for the next free slot and reserves the one after it. A zero
    /// cooldown never waits.
    pub async fn hit(&self) {
        if self.cooldown.is_zero() {
            return;
        }
        let mut next_slot = self.next_slot.lock().await;
        if let Some(slot) = *next_slot {
            sleep_until(slot).await;
        }
        *next_slot = Some(Instant::now() + self.cooldown);
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
