//! Store provider implementations

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::{RedisClusterStore, RedisStore};

use std::time::Duration;

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis(Duration::from_micros(999)), 0);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
