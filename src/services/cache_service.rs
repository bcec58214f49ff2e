use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

const DEFAULT_CAPACITY: u64 = 1_000;

/// TTL cache in front of network fetches.
///
/// Concurrent `get_or_fetch` calls for the same key share one in-flight
/// fetch; a failed fetch is not cached.
#[derive(Clone)]
pub struct FetchCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, V>,
    ttl: Duration,
}

impl<V> std::fmt::Debug for FetchCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl<V> FetchCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        debug!(ttl_secs = ttl.as_secs(), capacity, "fetch cache initialized");
        Self { inner, ttl }
    }

    pub async fn get_or_fetch<F>(&self, key: &str, fetch: F) -> Result<V>
    where
        F: Future<Output = Result<V>>,
    {
        self.inner
            .try_get_with(key.to_string(), fetch)
            .await
            .map_err(unshare)
    }

    pub async fn invalidate(&self, key: &str) {
        debug!(key, "invalidating cached fetch");
        self.inner.invalidate(key).await;
    }
}

// Every caller waiting on a coalesced fetch gets the same Arc'd error.
fn unshare(err: Arc<Error>) -> Error {
    match &*err {
        Error::Unauthorized(msg) => Error::Unauthorized(msg.clone()),
        Error::Locked { lockout_secs } => Error::Locked {
            lockout_secs: *lockout_secs,
        },
        Error::NotFound(msg) => Error::NotFound(msg.clone()),
        Error::BadRequest(msg) => Error::BadRequest(msg.clone()),
        Error::Api { status, message } => Error::Api {
            status: *status,
            message: message.clone(),
        },
        other => Error::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_fetches_share_one_request() {
        let cache: FetchCache<u32> = FetchCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(7)
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("profile:staff", fetch()),
            cache.get_or_fetch("profile:staff", fetch())
        );
        assert_eq!((a.unwrap(), b.unwrap()), (7, 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache: FetchCache<u32> = FetchCache::new(Duration::from_secs(60));
        let err = cache
            .get_or_fetch("k", async { Err(Error::Unauthorized("expired".into())) })
            .await
            .unwrap_err();
        assert!(err.requires_login());

        let ok = cache.get_or_fetch("k", async { Ok(1) }).await.unwrap();
        assert_eq!(ok, 1);
    }
}
