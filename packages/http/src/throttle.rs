//! Minimum-interval request throttle.
//!
//! Public geodata services (Nominatim, Overpass) publish usage policies
//! that cap request rates. A [`Throttle`] is owned by the client that
//! talks to such a service and can be shared between clients with an
//! `Arc`; every request calls [`Throttle::acquire`] immediately before it
//! is sent.

use std::time::Duration;

use tokio::{sync::Mutex, time::Instant};

/// Enforces a minimum interval between consecutive requests.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Creates a throttle allowing one request per `min_interval`.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// The configured minimum interval.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until at least the minimum interval has passed since the
    /// previous acquisition, then records the current instant.
    ///
    /// Concurrent callers are served one at a time.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                log::debug!("throttling request for {wait:?}");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_acquire_does_not_wait() {
        let throttle = Throttle::new(Duration::from_secs(12));
        let start = Instant::now();
        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_acquires_are_spaced() {
        let throttle = Throttle::new(Duration::from_secs(12));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(12));
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(24));
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_after_interval_elapsed() {
        let throttle = Throttle::new(Duration::from_secs(1));
        throttle.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let before = Instant::now();
        throttle.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn shared_throttle_spaces_all_holders() {
        let throttle = Arc::new(Throttle::new(Duration::from_secs(2)));
        let other = Arc::clone(&throttle);
        let start = Instant::now();
        throttle.acquire().await;
        other.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
