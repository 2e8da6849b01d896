//! In-memory store provider
//!
//! Keeps entries in-process with per-entry TTL. Useful for tests and for
//! embedding the cache without a server. A store built with
//! [`MemoryStore::cluster`] hashes keys over several partitions and exposes
//! each of them for fan-out, the way a cluster exposes its masters.
//!
//! Expired entries are reclaimed lazily: on reads of the key itself, on every
//! scan, and across the whole store every `SWEEP_INTERVAL` writes. Scan
//! cursors are key-hash positions, so keys deleted or added mid-scan never
//! shift the keys that follow.
//!
//! **Important**: state is local to the process; nothing is shared between
//! instances.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::keys::glob_matches;
use crate::cache::traits::StoreClient;
use dashmap::mapref::entry::Entry as SlotEntry;
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

type Partition = DashMap<String, Entry>;

const SWEEP_INTERVAL: usize = 1024;

fn key_hash(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Scan position of a key; never 0, which is reserved for "start" and "done"
fn scan_position(key: &str) -> u64 {
    key_hash(key) | 1
}

/// In-process store with optional simulated partitions
#[derive(Clone)]
pub struct MemoryStore {
    partitions: Arc<Vec<Partition>>,
    /// Restricts this handle to one partition (a "node" view)
    view: Option<usize>,
    clustered: bool,
    writes: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("partitions", &self.partitions.len())
            .field("view", &self.view)
            .field("clustered", &self.clustered)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Single-partition standalone store
    pub fn new() -> Self {
        Self {
            partitions: Arc::new(vec![Partition::new()]),
            view: None,
            clustered: false,
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Store spread over `partitions` simulated masters
    pub fn cluster(partitions: usize) -> Self {
        let partitions = partitions.max(1);
        Self {
            partitions: Arc::new((0..partitions).map(|_| Partition::new()).collect()),
            view: None,
            clustered: true,
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_clustered(&self) -> bool {
        self.clustered
    }

    /// One handle per partition, each seeing only its own keys
    pub fn partitions(&self) -> CacheResult<Vec<MemoryStore>> {
        if !self.clustered {
            return Err(CacheError::ClientNotCluster);
        }
        Ok((0..self.partitions.len())
            .map(|index| Self {
                partitions: Arc::clone(&self.partitions),
                view: Some(index),
                clustered: false,
                writes: Arc::clone(&self.writes),
            })
            .collect())
    }

    /// Number of live entries across the partitions this handle sees
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.visible()
            .map(|p| p.iter().filter(|e| e.value().is_live(now)).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining TTL of a key; `None` when absent or persistent
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.partition_for(key)
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn partition_for(&self, key: &str) -> &Partition {
        if let Some(index) = self.view {
            return &self.partitions[index];
        }
        let index = (key_hash(key) % self.partitions.len() as u64) as usize;
        &self.partitions[index]
    }

    fn visible(&self) -> impl Iterator<Item = &Partition> {
        let range = match self.view {
            Some(index) => index..index + 1,
            None => 0..self.partitions.len(),
        };
        range.map(move |index| &self.partitions[index])
    }

    fn live_value(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let partition = self.partition_for(key);
        let value = partition
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone());
        if value.is_none() {
            partition.remove_if(key, |_, e| !e.is_live(now));
        }
        value
    }

    /// Drop expired entries from the partitions this handle sees
    fn sweep(&self, now: Instant) {
        for partition in self.visible() {
            partition.retain(|_, e| e.is_live(now));
        }
    }

    fn record_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_INTERVAL == 0 {
            let now = Instant::now();
            for partition in self.partitions.iter() {
                partition.retain(|_, e| e.is_live(now));
            }
            debug!(writes = writes, "Expired entries swept (memory)");
        }
    }
}

fn entry(value: &[u8], ttl: Option<Duration>) -> Entry {
    Entry {
        value: value.to_vec(),
        expires_at: ttl.map(|ttl| Instant::now() + ttl),
    }
}

impl StoreClient for MemoryStore {
    async fn ping(&self) -> CacheResult<String> {
        Ok("PONG".to_string())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let result = self.live_value(key);

        if result.is_some() {
            debug!(key = key, "Cache HIT (memory)");
        } else {
            debug!(key = key, "Cache MISS (memory)");
        }

        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        self.partition_for(key)
            .insert(key.to_string(), entry(value, ttl));
        self.record_write();

        debug!(
            key = key,
            ttl_ms = ttl.map(super::millis),
            "Cache SET (memory)"
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let now = Instant::now();
        let created = match self.partition_for(key).entry(key.to_string()) {
            SlotEntry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    false
                } else {
                    occupied.insert(entry(value, ttl));
                    true
                }
            }
            SlotEntry::Vacant(vacant) => {
                vacant.insert(entry(value, ttl));
                true
            }
        };

        self.record_write();

        debug!(key = key, created = created, "Cache SET NX (memory)");
        Ok(created)
    }

    async fn delete(&self, key: &str) -> CacheResult<i64> {
        let now = Instant::now();
        let count = match self.partition_for(key).remove(key) {
            Some((_, e)) if e.is_live(now) => 1,
            _ => 0,
        };

        debug!(key = key, count = count, "Cache DEL (memory)");
        Ok(count)
    }

    async fn exists(&self, key: &str) -> CacheResult<i64> {
        Ok(i64::from(self.live_value(key).is_some()))
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<(u64, Vec<String>)> {
        let now = Instant::now();
        self.sweep(now);

        let mut keys: Vec<(u64, String)> = self
            .visible()
            .flat_map(|p| {
                p.iter()
                    .map(|e| (scan_position(e.key()), e.key().clone()))
                    .filter(|(position, _)| *position >= cursor)
                    .collect::<Vec<_>>()
            })
            .collect();
        keys.sort_unstable();

        let count = count.max(1);
        let next = keys.get(count).map_or(0, |(position, _)| *position);
        let page = keys
            .into_iter()
            .take(count)
            .map(|(_, key)| key)
            .filter(|key| glob_matches(pattern, key))
            .collect();

        Ok((next, page))
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("ns:k", b"v", None).await.unwrap();
        assert_eq!(store.get("ns:k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.exists("ns:k").await.unwrap(), 1);
        assert_eq!(store.delete("ns:k").await.unwrap(), 1);
        assert_eq!(store.delete("ns:k").await.unwrap(), 0);
        assert_eq!(store.get("ns:k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store
            .set("ns:k", b"v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(store.ttl("ns:k").is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("ns:k").await.unwrap(), None);
        assert_eq!(store.exists("ns:k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("ns:k", b"1", None).await.unwrap());
        assert!(!store.set_if_absent("ns:k", b"1", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_if_absent_replaces_expired_entry() {
        let store = MemoryStore::new();
        let ttl = Some(Duration::from_millis(10));
        assert!(store.set_if_absent("ns:k", b"1", ttl).await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.set_if_absent("ns:k", b"1", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_pages_with_cursor() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store.set(&format!("ns:p:{i:02}"), b"v", None).await.unwrap();
        }
        store.set("ns:other:x", b"v", None).await.unwrap();

        let mut cursor = 0;
        let mut found = Vec::new();
        loop {
            let (next, keys) = store.scan(cursor, "ns:p:*", 10).await.unwrap();
            found.extend(keys);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(found.len(), 25);
        assert!(found.iter().all(|k| k.starts_with("ns:p:")));
    }

    fn raw_entries(store: &MemoryStore) -> usize {
        store.partitions.iter().map(DashMap::len).sum()
    }

    #[tokio::test]
    async fn test_scan_keeps_keys_when_earlier_keys_are_deleted() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store.set(&format!("ns:p:{i:02}"), b"v", None).await.unwrap();
        }

        let (mut cursor, first_page) = store.scan(0, "ns:p:*", 10).await.unwrap();
        assert_eq!(first_page.len(), 10);
        assert_ne!(cursor, 0);
        for key in &first_page {
            store.delete(key).await.unwrap();
        }

        let mut rest = Vec::new();
        while cursor != 0 {
            let (next, keys) = store.scan(cursor, "ns:p:*", 10).await.unwrap();
            rest.extend(keys);
            cursor = next;
        }

        assert_eq!(rest.len(), 15);
        assert!(rest.iter().all(|k| !first_page.contains(k)));
        assert_eq!(store.len(), 15);
    }

    #[tokio::test]
    async fn test_scan_reclaims_expired_entries() {
        let store = MemoryStore::new();
        let ttl = Some(Duration::from_millis(5));
        for i in 0..1000 {
            store.set_if_absent(&format!("rate-limit:{i}"), b"1", ttl).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        store.set("ns:live", b"v", None).await.unwrap();
        assert_eq!(raw_entries(&store), 1001);

        store.scan(0, "*", 10).await.unwrap();
        assert_eq!(raw_entries(&store), 1);
    }

    #[tokio::test]
    async fn test_writes_reclaim_expired_entries() {
        let store = MemoryStore::cluster(2);
        let ttl = Some(Duration::from_millis(5));
        for i in 0..1000 {
            store.set(&format!("ns:short:{i}"), b"v", ttl).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        for i in 0..100 {
            store.set(&format!("ns:long:{i}"), b"v", None).await.unwrap();
        }
        assert_eq!(raw_entries(&store), 100);
    }

    #[tokio::test]
    async fn test_partitions_require_cluster() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.partitions(),
            Err(CacheError::ClientNotCluster)
        ));
    }

    #[tokio::test]
    async fn test_partitions_split_keys() {
        let store = MemoryStore::cluster(3);
        for i in 0..30 {
            store.set(&format!("ns:p:{i}"), b"v", None).await.unwrap();
        }

        let partitions = store.partitions().unwrap();
        assert_eq!(partitions.len(), 3);
        let total: usize = partitions.iter().map(MemoryStore::len).sum();
        assert_eq!(total, 30);
        assert_eq!(store.len(), 30);
    }
}
