//! Key enumeration by prefix
//!
//! Keys are walked with the SCAN cursor, never loaded in one reply. On a
//! clustered handle the scan runs once per partition and nowhere else; a
//! standalone handle scans its single connection.

use super::deadline::{Deadline, DeadlineScope};
use super::errors::{CacheError, CacheResult};
use super::executor::Executor;
use super::handle::CacheHandle;
use super::keys::{scan_pattern, Keyer};
use crate::constants::keys::SCAN_WILDCARD;
use std::collections::HashSet;
use tracing::debug;

impl CacheHandle {
    /// Every key directly under `namespace:prefix:`
    ///
    /// One trailing `*` on `prefix` is ignored. Each result is parsed back
    /// into a [`Keyer`].
    pub async fn get_all_keys(
        &self,
        deadline: Option<Deadline>,
        prefix: &str,
    ) -> CacheResult<Vec<Keyer>> {
        let connection = self.connection()?;
        let trimmed = prefix.strip_suffix(SCAN_WILDCARD).unwrap_or(prefix);
        if trimmed.trim().is_empty() {
            return Err(CacheError::EmptyPrefix);
        }

        let scope = DeadlineScope::acquire(deadline);
        let pattern = scan_pattern(self.namespace(), prefix);
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        if self.is_clustering() {
            let partitions = connection.partitions().await?;
            for partition in &partitions {
                Executor::new(partition, scope.deadline())
                    .scan_keys(&pattern, &mut seen, &mut found)
                    .await?;
            }
            debug!(
                pattern = %pattern,
                partitions = partitions.len(),
                keys = found.len(),
                "Cluster key scan complete"
            );
        } else {
            Executor::new(connection, scope.deadline())
                .scan_keys(&pattern, &mut seen, &mut found)
                .await?;
        }

        Ok(found.iter().map(|key| Keyer::parse(key)).collect())
    }
}
