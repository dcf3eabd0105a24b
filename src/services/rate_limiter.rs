use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration, Instant};

/// Politeness budget for calls to the market-data provider.
///
/// Yahoo throttles aggressive clients, so the downloaders keep a fixed gap
/// between requests (1.5 s for NSE symbols). The budget is expressed as a
/// minimum inter-request delay plus a cap on concurrent in-flight calls, so
/// the sequential per-universe loop and any future parallel variant share
/// the same quota.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    last_request: Arc<Mutex<Instant>>,
    min_delay: Duration,
}

impl RateLimiter {
    /// `max_concurrent` bounds in-flight provider calls; `min_delay` is the
    /// gap enforced between consecutive call starts.
    pub fn new(max_concurrent: usize, min_delay: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            last_request: Arc::new(Mutex::new(
                Instant::now() - min_delay.max(Duration::from_millis(1)),
            )),
            min_delay,
        }
    }

    /// Wait until a concurrency permit is free and the inter-request gap has
    /// elapsed. The returned guard releases the permit on drop.
    pub async fn acquire(&self) -> RateLimitGuard {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("rate limiter semaphore closed");

        let wait_time = {
            let last = self.last_request.lock();
            let elapsed = last.elapsed();

            if elapsed < self.min_delay {
                Some(self.min_delay - elapsed)
            } else {
                None
            }
        }; // lock dropped before sleeping

        if let Some(delay) = wait_time {
            sleep(delay).await;
        }

        *self.last_request.lock() = Instant::now();

        RateLimitGuard { _permit: permit }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Holds a concurrency permit; released when dropped.
pub struct RateLimitGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;

    #[tokio::test]
    async fn test_enforces_gap_between_requests() {
        let limiter = RateLimiter::new(2, Duration::from_millis(200));

        let start = StdInstant::now();

        let guard1 = limiter.acquire().await;
        assert!(start.elapsed().as_millis() < 100, "first call is immediate");
        drop(guard1);

        let _guard2 = limiter.acquire().await;
        assert!(
            start.elapsed().as_millis() >= 180,
            "second call waits out the gap"
        );
    }

    #[tokio::test]
    async fn test_concurrency_cap() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_millis(10)));
        assert_eq!(limiter.available_permits(), 2);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = limiter.acquire().await;
                sleep(Duration::from_millis(50)).await;
            }));
        }

        // The third task waits for a permit but all complete.
        for handle in handles {
            handle.await.unwrap();
        }

        // Guards dropped, all permits returned.
        assert_eq!(limiter.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_zero_delay_for_tests_is_immediate() {
        let limiter = RateLimiter::new(1, Duration::ZERO);

        let start = StdInstant::now();
        for _ in 0..5 {
            let _guard = limiter.acquire().await;
        }
        assert!(start.elapsed().as_millis() < 100);
    }
}
