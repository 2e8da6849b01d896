//! Backend round-trips for the request builders
//!
//! Each call qualifies nothing and validates nothing: the builders hand over
//! fully-qualified keys. The executor encodes, bounds the round-trip by the
//! request deadline and decodes.

use super::codec::{self, CacheDecode, CacheEncode};
use super::connection::Connection;
use super::deadline::Deadline;
use super::errors::{CacheError, CacheResult};
use super::traits::StoreClient;
use crate::constants::SCAN_BATCH_SIZE;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Executes one logical operation against a connection under a deadline
#[derive(Debug, Clone, Copy)]
pub(crate) struct Executor<'a> {
    connection: &'a Connection,
    deadline: &'a Deadline,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(connection: &'a Connection, deadline: &'a Deadline) -> Self {
        Self {
            connection,
            deadline,
        }
    }

    /// Encode and store; `ttl = Duration::ZERO` means no expiration
    pub(crate) async fn set_value<V>(&self, key: &str, value: &V, ttl: Duration) -> CacheResult<()>
    where
        V: CacheEncode + ?Sized,
    {
        let encoded = codec::encode(value)?;
        let ttl = (!ttl.is_zero()).then_some(ttl);
        self.deadline
            .run("set", key, self.connection.set(key, &encoded, ttl))
            .await
    }

    /// Raw bytes of `key`; a missing key is `NotFound`
    pub(crate) async fn fetch(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.deadline
            .run("get", key, self.connection.get(key))
            .await?
            .ok_or_else(|| CacheError::NotFound {
                key: key.to_string(),
            })
    }

    /// Fetch and decode into `out`
    pub(crate) async fn get_value<T: CacheDecode>(&self, key: &str, out: &mut T) -> CacheResult<()> {
        let bytes = self.fetch(key).await?;
        codec::decode_into(&bytes, out)
    }

    pub(crate) async fn delete_key(&self, key: &str) -> CacheResult<i64> {
        self.deadline
            .run("delete", key, self.connection.delete(key))
            .await
    }

    pub(crate) async fn exists(&self, key: &str) -> CacheResult<bool> {
        let count = self
            .deadline
            .run("exists", key, self.connection.exists(key))
            .await?;
        Ok(count > 0)
    }

    /// Atomic create-if-absent with expiry
    pub(crate) async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> CacheResult<bool> {
        let ttl = (!ttl.is_zero()).then_some(ttl);
        self.deadline
            .run("set_if_absent", key, self.connection.set_if_absent(key, value, ttl))
            .await
    }

    /// Walk the SCAN cursor to completion, adding new keys to `found`
    ///
    /// Keys already present in `seen` are skipped so that a key reachable
    /// through more than one partition is reported once.
    pub(crate) async fn scan_keys(
        &self,
        pattern: &str,
        seen: &mut HashSet<String>,
        found: &mut Vec<String>,
    ) -> CacheResult<()> {
        let mut cursor = 0u64;
        let mut pages = 0usize;
        loop {
            let (next, keys) = self
                .deadline
                .run(
                    "scan",
                    pattern,
                    self.connection.scan(cursor, pattern, SCAN_BATCH_SIZE),
                )
                .await?;
            pages += 1;

            for key in keys {
                if seen.insert(key.clone()) {
                    found.push(key);
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(
            pattern = pattern,
            pages = pages,
            provider = self.connection.provider_name(),
            "Cache SCAN complete"
        );
        Ok(())
    }
}
