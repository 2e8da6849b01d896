//! Get / Set / Delete request builders
//!
//! A builder is created by [`CacheHandle`](super::CacheHandle), configured
//! by chaining, and consumed by exactly one terminal call. Its
//! [`DeadlineScope`] is dropped with it, so a default deadline is released
//! on every exit path of the terminal call.
//!
//! ```rust
//! use typed_cache::cache::{CacheHandle, MemoryStore};
//! use typed_cache::config::CacheConfig;
//! use std::time::Duration;
//!
//! # async fn example() -> typed_cache::cache::CacheResult<()> {
//! let cache = CacheHandle::in_memory(CacheConfig::default(), MemoryStore::new());
//!
//! cache
//!     .set(None, "42")
//!     .set_prefix("user")
//!     .set_ttl(Duration::from_secs(300))
//!     .put("alice")
//!     .await?;
//!
//! let name: String = cache.get(None, "42", "user").pull().await?;
//! assert_eq!(name, "alice");
//! # Ok(())
//! # }
//! ```

use super::codec::{CacheDecode, CacheEncode};
use super::connection::Connection;
use super::deadline::{Deadline, DeadlineScope};
use super::errors::{CacheError, CacheResult};
use super::executor::Executor;
use super::handle::CacheHandle;
use super::keys::prepend_prefix;
use crate::constants::DEFAULT_TTL;
use std::time::Duration;

fn ensure_key(key: &str) -> CacheResult<()> {
    if key.trim().is_empty() {
        return Err(CacheError::EmptyKey);
    }
    Ok(())
}

/// Get request for one key
#[derive(Debug)]
pub struct GetRequest<'a> {
    pub(super) handle: &'a CacheHandle,
    pub(super) scope: DeadlineScope,
    pub(super) key: String,
}

impl<'a> GetRequest<'a> {
    pub(super) fn new(handle: &'a CacheHandle, scope: DeadlineScope, key: String) -> Self {
        Self { handle, scope, key }
    }

    /// Key with call-site prefix, before namespace qualification
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fully-qualified key this request reads
    pub fn qualified_key(&self) -> String {
        self.handle.qualify(&self.key)
    }

    pub fn deadline(&self) -> &Deadline {
        self.scope.deadline()
    }

    pub(super) fn target(&self) -> CacheResult<(&'a Connection, String)> {
        ensure_key(&self.key)?;
        let connection = self.handle.connection()?;
        Ok((connection, self.qualified_key()))
    }

    /// Fetch the value and decode it into `out`
    ///
    /// `out` is left untouched on any failure; a missing key is
    /// [`CacheError::NotFound`].
    pub async fn pull_into<T: CacheDecode>(self, out: &mut T) -> CacheResult<()> {
        let (connection, key) = self.target()?;
        Executor::new(connection, self.scope.deadline())
            .get_value(&key, out)
            .await
    }

    /// Fetch the value and decode it as `T`
    pub async fn pull<T: CacheDecode>(self) -> CacheResult<T> {
        let (connection, key) = self.target()?;
        let executor = Executor::new(connection, self.scope.deadline());
        let bytes = executor.fetch(&key).await?;
        T::decode(&bytes)
    }
}

/// Set request for one key
#[derive(Debug)]
pub struct SetRequest<'a> {
    pub(super) handle: &'a CacheHandle,
    pub(super) scope: DeadlineScope,
    pub(super) key: String,
    pub(super) ttl: Duration,
}

impl<'a> SetRequest<'a> {
    pub(super) fn new(handle: &'a CacheHandle, scope: DeadlineScope, key: String) -> Self {
        Self {
            handle,
            scope,
            key,
            ttl: Duration::ZERO,
        }
    }

    /// Prepend `prefix` to the key; an empty prefix is ignored
    pub fn set_prefix(mut self, prefix: &str) -> Self {
        self.key = prepend_prefix(prefix, &self.key);
        self
    }

    /// Time-to-live for `put`; zero selects the default
    pub fn set_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn qualified_key(&self) -> String {
        self.handle.qualify(&self.key)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn deadline(&self) -> &Deadline {
        self.scope.deadline()
    }

    pub(super) fn target(&self) -> CacheResult<(&'a Connection, String)> {
        let connection = self.handle.connection()?;
        ensure_key(&self.key)?;
        Ok((connection, self.qualified_key()))
    }

    /// Store `value` with the configured TTL (default one minute)
    ///
    /// Returns the TTL that was applied.
    pub async fn put<V: CacheEncode + ?Sized>(mut self, value: &V) -> CacheResult<Duration> {
        if self.ttl.is_zero() {
            self.ttl = DEFAULT_TTL;
        }
        self.store(value).await
    }

    /// Store `value` without expiration, ignoring any configured TTL
    pub async fn put_forever<V: CacheEncode + ?Sized>(mut self, value: &V) -> CacheResult<Duration> {
        self.ttl = Duration::ZERO;
        self.store(value).await
    }

    async fn store<V: CacheEncode + ?Sized>(self, value: &V) -> CacheResult<Duration> {
        let (connection, key) = self.target()?;
        Executor::new(connection, self.scope.deadline())
            .set_value(&key, value, self.ttl)
            .await?;
        Ok(self.ttl)
    }
}

/// Delete request for one key
#[derive(Debug)]
pub struct DeleteRequest<'a> {
    handle: &'a CacheHandle,
    scope: DeadlineScope,
    key: String,
}

impl<'a> DeleteRequest<'a> {
    pub(super) fn new(handle: &'a CacheHandle, scope: DeadlineScope, key: String) -> Self {
        Self { handle, scope, key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn qualified_key(&self) -> String {
        self.handle.qualify(&self.key)
    }

    pub fn deadline(&self) -> &Deadline {
        self.scope.deadline()
    }

    /// Delete the key, returning how many keys were removed
    pub async fn perform(self) -> CacheResult<i64> {
        ensure_key(&self.key)?;
        let connection = self.handle.connection()?;
        Executor::new(connection, self.scope.deadline())
            .delete_key(&self.qualified_key())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::providers::MemoryStore;
    use crate::config::CacheConfig;

    fn handle() -> CacheHandle {
        CacheHandle::in_memory(CacheConfig::default(), MemoryStore::new())
    }

    #[test]
    fn test_qualified_key_with_prefix() {
        let cache = handle();
        assert_eq!(cache.get(None, "K", "P").qualified_key(), "cache-app:P:K");
        assert_eq!(cache.get(None, "K", "").qualified_key(), "cache-app:K");
        assert_eq!(cache.delete(None, "K", "P").qualified_key(), "cache-app:P:K");
    }

    #[test]
    fn test_set_prefixes_stack() {
        let cache = handle();
        let request = cache.set(None, "K").set_prefix("inner").set_prefix("").set_prefix("outer");
        assert_eq!(request.key(), "outer:inner:K");
        assert_eq!(request.qualified_key(), "cache-app:outer:inner:K");
    }

    #[test]
    fn test_builder_drop_releases_default_deadline() {
        let cache = handle();
        let request = cache.get(None, "K", "");
        let observer = request.deadline().clone();
        drop(request);
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_builder_keeps_caller_deadline_alive() {
        let cache = handle();
        let external = Deadline::after(Duration::from_secs(5));
        drop(cache.set(Some(external.clone()), "K"));
        assert!(!external.is_cancelled());
    }

    #[tokio::test]
    async fn test_put_then_pull() {
        let cache = handle();
        cache
            .set(None, "TestSet")
            .set_prefix("test")
            .put("test_value")
            .await
            .unwrap();

        let mut out = String::new();
        cache.get(None, "TestSet", "test").pull_into(&mut out).await.unwrap();
        assert_eq!(out, "test_value");
    }

    #[tokio::test]
    async fn test_put_defaults_ttl() {
        let cache = handle();
        let ttl = cache.set(None, "K").put(&1u8).await.unwrap();
        assert_eq!(ttl, DEFAULT_TTL);

        let ttl = cache
            .set(None, "K")
            .set_ttl(Duration::from_secs(5))
            .put(&1u8)
            .await
            .unwrap();
        assert_eq!(ttl, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_put_forever_ignores_ttl() {
        let cache = handle();
        let ttl = cache
            .set(None, "K")
            .set_ttl(Duration::from_secs(5))
            .put_forever("v")
            .await
            .unwrap();
        assert_eq!(ttl, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let cache = handle();
        assert!(matches!(
            cache.set(None, "").put("v").await,
            Err(CacheError::EmptyKey)
        ));
        assert!(matches!(
            cache.get(None, " ", "").pull::<String>().await,
            Err(CacheError::EmptyKey)
        ));
        assert!(matches!(
            cache.delete(None, "", "").perform().await,
            Err(CacheError::EmptyKey)
        ));
    }

    #[tokio::test]
    async fn test_closed_handle_is_client_nil() {
        let cache = CacheHandle::new(CacheConfig::default());
        assert!(matches!(
            cache.set(None, "K").put("v").await,
            Err(CacheError::ClientNil)
        ));
        assert!(matches!(
            cache.get(None, "K", "").pull::<String>().await,
            Err(CacheError::ClientNil)
        ));
        assert!(matches!(
            cache.delete(None, "K", "").perform().await,
            Err(CacheError::ClientNil)
        ));
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let cache = handle();
        assert_eq!(cache.delete(None, "K", "P").perform().await.unwrap(), 0);
        cache.set(None, "K").set_prefix("P").put("v").await.unwrap();
        assert_eq!(cache.delete(None, "K", "P").perform().await.unwrap(), 1);
    }
}
