use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

struct Stored<T> {
    value: T,
    fetched_at: Instant,
}

/// Single-value TTL cache that prefers a stale value over an error.
///
/// Used for ancillary lookups such as voice catalogs: after the TTL the next
/// call refreshes, and a failed refresh falls back to the last good value.
pub struct StaleCache<T> {
    ttl: Duration,
    slot: Mutex<Option<Stored<T>>>,
    refresh: tokio::sync::Mutex<()>,
}

impl<T: Clone> StaleCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    fn fresh(&self) -> Option<T> {
        self.slot
            .lock()
            .as_ref()
            .filter(|stored| stored.fetched_at.elapsed() < self.ttl)
            .map(|stored| stored.value.clone())
    }

    fn stale(&self) -> Option<T> {
        self.slot.lock().as_ref().map(|stored| stored.value.clone())
    }

    /// Return the cached value while fresh, otherwise refresh through `fetch`.
    ///
    /// Concurrent callers share one refresh.
    pub async fn get_or_refresh<F, Fut, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if let Some(value) = self.fresh() {
            return Ok(value);
        }

        let _refreshing = self.refresh.lock().await;
        if let Some(value) = self.fresh() {
            return Ok(value);
        }

        match fetch().await {
            Ok(value) => {
                *self.slot.lock() = Some(Stored {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(value)
            }
            Err(err) => match self.stale() {
                Some(value) => {
                    tracing::warn!(error = %err, "Refresh failed; serving stale value");
                    Ok(value)
                }
                None => Err(err),
            },
        }
    }
}
