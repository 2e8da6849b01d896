//! Get-or-populate
//!
//! `remember` probes for the key, and on a miss computes the value, stores
//! it and hands it back without a decode round-trip. The sequence is not
//! atomic: concurrent callers missing the same key may each compute and
//! write, and the last write wins. Callers that need a single writer must
//! coordinate externally, for example with
//! [`SetRequest::rate_limit_once`](super::SetRequest::rate_limit_once).

use super::codec::CacheCodec;
use super::deadline::DeadlineScope;
use super::errors::{CacheError, CacheResult, ComputeError};
use super::executor::Executor;
use super::providers::millis;
use super::request::{GetRequest, SetRequest};
use std::future::Future;
use tracing::debug;

impl GetRequest<'_> {
    /// Read the key into `out`, computing and storing it first on a miss
    ///
    /// `compute` returns `(persist_forever, value)`. It is not invoked when
    /// the key exists. On a miss the value is converted into `T` (failing
    /// with [`CacheError::TypeMismatch`] when the conversion is refused),
    /// stored under the same key, either without expiration or with the
    /// default TTL, and assigned to `out`.
    ///
    /// On any failure nothing is assigned and, for compute or conversion
    /// failures, nothing is written.
    ///
    /// ```rust
    /// use typed_cache::cache::{CacheHandle, MemoryStore};
    /// use typed_cache::config::CacheConfig;
    ///
    /// # async fn example() -> typed_cache::cache::CacheResult<()> {
    /// let cache = CacheHandle::in_memory(CacheConfig::default(), MemoryStore::new());
    ///
    /// let mut greeting = String::new();
    /// cache
    ///     .get(None, "greeting", "copy")
    ///     .remember(&mut greeting, || async { Ok::<_, std::io::Error>((true, "hello")) })
    ///     .await?;
    /// assert_eq!(greeting, "hello");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn remember<T, V, F, Fut, E>(self, out: &mut T, compute: F) -> CacheResult<()>
    where
        T: CacheCodec + TryFrom<V>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(bool, V), E>>,
        E: Into<ComputeError>,
    {
        let (connection, key) = self.target()?;
        let executor = Executor::new(connection, self.scope.deadline());

        if executor.exists(&key).await? {
            debug!(key = %key, "Remember HIT");
            return executor.get_value(&key, out).await;
        }

        let (forever, computed) = compute()
            .await
            .map_err(|e| CacheError::Compute(e.into()))?;

        let value = T::try_from(computed).map_err(|_| CacheError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            actual: std::any::type_name::<V>(),
        })?;

        let set = SetRequest::new(
            self.handle,
            DeadlineScope::acquire(Some(self.scope.deadline().clone())),
            self.key.clone(),
        );
        let ttl = if forever {
            set.put_forever(&value).await?
        } else {
            set.put(&value).await?
        };

        debug!(key = %key, ttl_ms = millis(ttl), "Remember MISS stored");
        *out = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::errors::CacheError;
    use crate::cache::providers::MemoryStore;
    use crate::cache::CacheHandle;
    use crate::config::CacheConfig;
    use crate::constants::DEFAULT_TTL;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn handle() -> (CacheHandle, MemoryStore) {
        let store = MemoryStore::new();
        (
            CacheHandle::in_memory(CacheConfig::default(), store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn test_existing_key_skips_compute() {
        let (cache, _) = handle();
        cache.set(None, "K").set_prefix("P").put("stored").await.unwrap();

        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let mut out = String::new();
        cache
            .get(None, "K", "P")
            .remember(&mut out, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>((false, "computed"))
            })
            .await
            .unwrap();

        assert_eq!(out, "stored");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_stores_with_default_ttl() {
        let (cache, store) = handle();
        let mut out = 0i64;
        cache
            .get(None, "K", "P")
            .remember(&mut out, || async { Ok::<_, std::io::Error>((false, 7i32)) })
            .await
            .unwrap();

        assert_eq!(out, 7);
        let ttl = store.ttl("cache-app:P:K").unwrap();
        assert!(ttl <= DEFAULT_TTL && ttl > Duration::from_secs(50));
        assert_eq!(cache.get(None, "K", "P").pull::<i64>().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_miss_forever_has_no_ttl() {
        let (cache, store) = handle();
        let mut out = String::new();
        cache
            .get(None, "K", "")
            .remember(&mut out, || async { Ok::<_, String>((true, "v".to_string())) })
            .await
            .unwrap();

        assert_eq!(out, "v");
        assert_eq!(store.len(), 1);
        assert_eq!(store.ttl("cache-app:K"), None);
    }

    #[tokio::test]
    async fn test_compute_failure_leaves_destination_and_store_untouched() {
        let (cache, store) = handle();
        let mut out = String::new();
        let err = cache
            .get(None, "K", "P")
            .remember(&mut out, || async {
                Err::<(bool, String), _>("backend of record unavailable")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Compute(_)));
        assert!(err.to_string().contains("backend of record unavailable"));
        assert!(out.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_type_mismatch_makes_no_write() {
        let (cache, store) = handle();
        let mut out = 0u8;
        let err = cache
            .get(None, "K", "P")
            .remember(&mut out, || async { Ok::<_, std::io::Error>((false, 300i64)) })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CacheError::TypeMismatch {
                expected: "u8",
                actual: "i64"
            }
        ));
        assert_eq!(out, 0);
        assert!(store.is_empty());
    }
}
