//! One-shot rate limiting
//!
//! A fixed window admitting a single caller: the first conditional create of
//! `rate-limit:<key>` wins until the key expires. Correctness rests on the
//! backend's create-if-absent being atomic.

use super::executor::Executor;
use super::errors::CacheResult;
use super::request::SetRequest;
use crate::constants::keys::KEY_RATE_LIMIT;
use crate::constants::RATE_LIMIT_MARKER;
use std::time::Duration;
use tracing::debug;

impl SetRequest<'_> {
    /// Admit the caller at most once per `period`
    ///
    /// Returns `true` when this call created the marker and `false` when the
    /// window is still held. A zero `period` keeps any TTL set with
    /// `set_ttl`; with neither, the marker never expires.
    ///
    /// ```rust
    /// use typed_cache::cache::{CacheHandle, MemoryStore};
    /// use typed_cache::config::CacheConfig;
    /// use std::time::Duration;
    ///
    /// # async fn example() -> typed_cache::cache::CacheResult<()> {
    /// let cache = CacheHandle::in_memory(CacheConfig::default(), MemoryStore::new());
    ///
    /// let first = cache.set(None, "user:42").rate_limit_once(Duration::from_secs(60)).await?;
    /// let second = cache.set(None, "user:42").rate_limit_once(Duration::from_secs(60)).await?;
    /// assert!(first && !second);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn rate_limit_once(mut self, period: Duration) -> CacheResult<bool> {
        if !self.key.trim().is_empty() {
            self = self.set_prefix(KEY_RATE_LIMIT);
        }
        if !period.is_zero() {
            self = self.set_ttl(period);
        }

        let (connection, key) = self.target()?;
        let allowed = Executor::new(connection, self.scope.deadline())
            .set_if_absent(&key, RATE_LIMIT_MARKER.as_bytes(), self.ttl)
            .await?;

        debug!(key = %key, allowed = allowed, "Rate limit check");
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::errors::CacheError;
    use crate::cache::providers::MemoryStore;
    use crate::cache::CacheHandle;
    use crate::config::CacheConfig;
    use std::time::Duration;

    fn handle() -> (CacheHandle, MemoryStore) {
        let store = MemoryStore::new();
        (
            CacheHandle::in_memory(CacheConfig::default(), store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn test_second_call_within_period_is_denied() {
        let (cache, _) = handle();
        let period = Duration::from_secs(60);
        assert!(cache.set(None, "login").rate_limit_once(period).await.unwrap());
        assert!(!cache.set(None, "login").rate_limit_once(period).await.unwrap());
        assert!(cache.set(None, "logout").rate_limit_once(period).await.unwrap());
    }

    #[tokio::test]
    async fn test_marker_key_and_expiry() {
        let (cache, store) = handle();
        assert!(cache
            .set(None, "42")
            .set_prefix("user")
            .rate_limit_once(Duration::from_secs(30))
            .await
            .unwrap());

        let ttl = store.ttl("cache-app:rate-limit:user:42").unwrap();
        assert!(ttl <= Duration::from_secs(30));
        assert_eq!(
            cache
                .get(None, "42", "rate-limit:user")
                .pull::<String>()
                .await
                .unwrap(),
            "1"
        );
    }

    #[tokio::test]
    async fn test_zero_period_keeps_configured_ttl() {
        let (cache, store) = handle();
        cache
            .set(None, "job")
            .set_ttl(Duration::from_secs(10))
            .rate_limit_once(Duration::ZERO)
            .await
            .unwrap();
        let ttl = store.ttl("cache-app:rate-limit:job").unwrap();
        assert!(ttl <= Duration::from_secs(10) && ttl > Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_window_reopens_after_expiry() {
        let (cache, _) = handle();
        let period = Duration::from_millis(20);
        assert!(cache.set(None, "k").rate_limit_once(period).await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.set(None, "k").rate_limit_once(period).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let (cache, store) = handle();
        assert!(matches!(
            cache.set(None, "").rate_limit_once(Duration::from_secs(1)).await,
            Err(CacheError::EmptyKey)
        ));
        assert!(store.is_empty());
    }
}
