//! Backend connection with enum dispatch
//!
//! ```text
//! Connection (enum)             <- no vtable, one match per call
//!   ├── Managed(RedisStore)       <- standalone server, auto-reconnect
//!   ├── Node(RedisStore)          <- sentinel master or one cluster master
//!   ├── Cluster(RedisClusterStore)<- slot-routed cluster client
//!   ├── Failover(RedisStore)      <- sentinel master, its own single partition
//!   └── Memory(MemoryStore)       <- in-process store
//! ```

use super::errors::{CacheError, CacheResult};
use super::providers::{MemoryStore, RedisClusterStore, RedisStore};
use super::traits::StoreClient;
use crate::config::{CacheConfig, Topology};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use std::time::Duration;
use tracing::info;

/// An open backend connection
#[derive(Debug, Clone)]
pub enum Connection {
    /// Standalone server (boxed to keep the enum small)
    Managed(Box<RedisStore<ConnectionManager>>),

    /// Direct connection to a single node
    Node(Box<RedisStore<MultiplexedConnection>>),

    /// Redis cluster
    Cluster(Box<RedisClusterStore>),

    /// Sentinel-managed master in cluster mode; its only partition is itself
    Failover(Box<RedisStore<MultiplexedConnection>>),

    /// In-process store
    Memory(MemoryStore),
}

impl From<MemoryStore> for Connection {
    fn from(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}

impl Connection {
    /// Connect according to the configured topology
    ///
    /// Returns the connection together with the clustering flag that decides
    /// whether key scans fan out over partitions.
    pub async fn open(config: &CacheConfig) -> CacheResult<(Self, bool)> {
        let topology = config.topology()?;
        let clustering = topology.is_clustered();

        let connection = match &topology {
            Topology::Standalone { address } => {
                let store = RedisStore::standalone(address, config.node_connection_info()).await?;
                Self::Managed(Box::new(store))
            }
            Topology::Cluster { addresses } => {
                let store =
                    RedisClusterStore::connect(addresses, config.node_connection_info()).await?;
                Self::Cluster(Box::new(store))
            }
            Topology::Sentinel {
                addresses,
                master,
                cluster,
            } => {
                let sentinels = addresses
                    .iter()
                    .map(|addr| {
                        super::providers::redis::connection_info(
                            addr,
                            config.sentinel_connection_info(),
                        )
                    })
                    .collect::<CacheResult<Vec<_>>>()?;
                let store =
                    RedisStore::sentinel(sentinels, master, config.node_connection_info()).await?;
                if *cluster {
                    Self::Failover(Box::new(store))
                } else {
                    Self::Node(Box::new(store))
                }
            }
        };

        info!(
            provider = connection.provider_name(),
            topology = ?topology,
            clustering = clustering,
            "Cache connection opened"
        );
        Ok((connection, clustering))
    }

    /// One connection per partition (cluster master) for fan-out
    ///
    /// A sentinel master in cluster mode is its own single partition. Fails
    /// with `ClientNotCluster` for standalone and single-node connections.
    pub async fn partitions(&self) -> CacheResult<Vec<Connection>> {
        match self {
            Self::Cluster(s) => Ok(s
                .masters()
                .await?
                .into_iter()
                .map(|node| Self::Node(Box::new(node)))
                .collect()),
            Self::Failover(master) => Ok(vec![Self::Node(master.clone())]),
            Self::Memory(s) => Ok(s.partitions()?.into_iter().map(Self::Memory).collect()),
            Self::Managed(_) | Self::Node(_) => Err(CacheError::ClientNotCluster),
        }
    }
}

impl StoreClient for Connection {
    async fn ping(&self) -> CacheResult<String> {
        match self {
            Self::Managed(s) => s.ping().await,
            Self::Node(s) => s.ping().await,
            Self::Cluster(s) => s.store().ping().await,
            Self::Failover(s) => s.ping().await,
            Self::Memory(s) => s.ping().await,
        }
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self {
            Self::Managed(s) => s.get(key).await,
            Self::Node(s) => s.get(key).await,
            Self::Cluster(s) => s.store().get(key).await,
            Self::Failover(s) => s.get(key).await,
            Self::Memory(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        match self {
            Self::Managed(s) => s.set(key, value, ttl).await,
            Self::Node(s) => s.set(key, value, ttl).await,
            Self::Cluster(s) => s.store().set(key, value, ttl).await,
            Self::Failover(s) => s.set(key, value, ttl).await,
            Self::Memory(s) => s.set(key, value, ttl).await,
        }
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        match self {
            Self::Managed(s) => s.set_if_absent(key, value, ttl).await,
            Self::Node(s) => s.set_if_absent(key, value, ttl).await,
            Self::Cluster(s) => s.store().set_if_absent(key, value, ttl).await,
            Self::Failover(s) => s.set_if_absent(key, value, ttl).await,
            Self::Memory(s) => s.set_if_absent(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<i64> {
        match self {
            Self::Managed(s) => s.delete(key).await,
            Self::Node(s) => s.delete(key).await,
            Self::Cluster(s) => s.store().delete(key).await,
            Self::Failover(s) => s.delete(key).await,
            Self::Memory(s) => s.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> CacheResult<i64> {
        match self {
            Self::Managed(s) => s.exists(key).await,
            Self::Node(s) => s.exists(key).await,
            Self::Cluster(s) => s.store().exists(key).await,
            Self::Failover(s) => s.exists(key).await,
            Self::Memory(s) => s.exists(key).await,
        }
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        match self {
            Self::Managed(s) => s.scan(cursor, pattern, count).await,
            Self::Node(s) => s.scan(cursor, pattern, count).await,
            Self::Cluster(s) => s.store().scan(cursor, pattern, count).await,
            Self::Failover(s) => s.scan(cursor, pattern, count).await,
            Self::Memory(s) => s.scan(cursor, pattern, count).await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            Self::Managed(s) => s.provider_name(),
            Self::Node(s) => s.provider_name(),
            Self::Cluster(_) => "redis-cluster",
            Self::Failover(s) => s.provider_name(),
            Self::Memory(s) => s.provider_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_connection_delegates() {
        let connection = Connection::from(MemoryStore::new());
        assert_eq!(connection.provider_name(), "memory");
        assert_eq!(connection.ping().await.unwrap(), "PONG");

        connection.set("ns:k", b"v", None).await.unwrap();
        assert_eq!(connection.exists("ns:k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_standalone_memory_has_no_partitions() {
        let connection = Connection::from(MemoryStore::new());
        assert!(matches!(
            connection.partitions().await,
            Err(CacheError::ClientNotCluster)
        ));
    }

    #[tokio::test]
    async fn test_clustered_memory_exposes_partitions() {
        let connection = Connection::from(MemoryStore::cluster(4));
        let partitions = connection.partitions().await.unwrap();
        assert_eq!(partitions.len(), 4);
        assert!(partitions.iter().all(|p| matches!(p, Connection::Memory(_))));
    }

    #[tokio::test]
    async fn test_open_without_addresses_fails() {
        let result = Connection::open(&CacheConfig::default()).await;
        assert!(matches!(result, Err(CacheError::Connection(_))));
    }

    #[cfg(feature = "test-services")]
    mod integration {
        use super::*;
        use crate::cache::handle::CacheHandle;
        use redis::RedisConnectionInfo;
        use tracing::warn;

        fn test_address() -> String {
            std::env::var("CACHE_TEST_ADDRESS").unwrap_or_else(|_| "localhost:6379".to_string())
        }

        #[tokio::test]
        async fn test_failover_master_scans_as_single_partition() {
            let store = match RedisStore::node(&test_address(), RedisConnectionInfo::default()).await {
                Ok(store) => store,
                Err(e) => {
                    warn!("Skipping Redis test (not available): {}", e);
                    return;
                }
            };
            let connection = Connection::Failover(Box::new(store));
            assert_eq!(connection.partitions().await.unwrap().len(), 1);

            let config = CacheConfig {
                namespace: format!("failover-{}", uuid::Uuid::new_v4()),
                ..CacheConfig::default()
            };
            let cache = CacheHandle::with_connection(config, connection, true);
            for i in 0..5 {
                cache.set(None, &format!("k{i}")).set_prefix("test").put(&i).await.unwrap();
            }

            let keys = cache.get_all_keys(None, "test").await.unwrap();
            assert_eq!(keys.len(), 5);

            for key in keys {
                cache.delete(None, &key.key, "test").perform().await.unwrap();
            }
        }
    }
}
