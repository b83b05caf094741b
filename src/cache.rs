//! Time-bounded caching for remote verification lookups.
//!
//! The transaction-listing verifiers pull a full page set per query, which
//! is far too expensive to repeat on every callback. [`TtlCache`] keeps the
//! last fetched value for a bounded lifetime and coalesces concurrent
//! refreshes: the lock is held across the fetch, so a burst of callers
//! triggers exactly one upstream request.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// A single-value cache with a fixed time-to-live.
pub struct TtlCache<T> {
    ttl: Duration,
    slot: Mutex<Option<(Instant, T)>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached value if it is still fresh, otherwise runs
    /// `refresh` and caches its result. Errors are not cached; the next
    /// caller retries.
    pub async fn get_or_refresh<E, F, Fut>(&self, refresh: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some((stored_at, value)) = slot.as_ref() {
            if stored_at.elapsed() < self.ttl {
                return Ok(value.clone());
            }
        }
        let value = refresh().await?;
        *slot = Some((Instant::now(), value.clone()));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn serves_cached_value_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let fetches = AtomicUsize::new(0);
        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .get_or_refresh(|| async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value, Ok(42));
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refreshes_after_expiry() {
        let cache = TtlCache::new(Duration::ZERO);
        let fetches = AtomicUsize::new(0);
        for _ in 0..2 {
            let _: Result<u32, ()> = cache
                .get_or_refresh(|| async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await;
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        let failed: Result<u32, &str> = cache.get_or_refresh(|| async { Err("down") }).await;
        assert_eq!(failed, Err("down"));
        let ok: Result<u32, &str> = cache.get_or_refresh(|| async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
    }
}
