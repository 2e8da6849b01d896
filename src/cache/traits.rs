//! Store client trait definition
//!
//! The minimal capability set the cache needs from a key-value backend.
//! Keys passed here are already fully qualified; deadlines are applied by
//! the caller around each future.

use super::errors::CacheResult;
use std::future::Future;
use std::time::Duration;

/// Trait defining backend operations
///
/// Implemented by concrete store providers (Redis, in-memory).
pub trait StoreClient: Send + Sync {
    /// Liveness probe, returns the backend's reply text
    fn ping(&self) -> impl Future<Output = CacheResult<String>> + Send;

    /// Fetch raw bytes; `Ok(None)` when the key is absent
    fn get(&self, key: &str) -> impl Future<Output = CacheResult<Option<Vec<u8>>>> + Send;

    /// Unconditional write; `ttl = None` means no expiration
    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Atomic create-if-absent; returns whether the key was created
    fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Delete a key, returning the number of keys removed
    fn delete(&self, key: &str) -> impl Future<Output = CacheResult<i64>> + Send;

    /// Number of the given keys that exist
    fn exists(&self, key: &str) -> impl Future<Output = CacheResult<i64>> + Send;

    /// One SCAN page: `(next_cursor, keys)`; a zero cursor ends the iteration
    fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> impl Future<Output = CacheResult<(u64, Vec<String>)>> + Send;

    /// Get the name of the store provider
    fn provider_name(&self) -> &'static str;
}
