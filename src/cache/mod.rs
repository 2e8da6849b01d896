//! # Typed Cache
//!
//! Namespaced, typed get/set/delete over a Redis deployment (standalone,
//! cluster or sentinel) or an in-process store.
//!
//! ## Architecture
//!
//! ```text
//! CacheHandle                     <- owns config + connection, passed explicitly
//!   ├── get / set / delete        <- single-use request builders (DeadlineScope)
//!   │     └── Executor            <- codec + deadline-bounded round-trips
//!   │           └── Connection    <- enum dispatch over StoreClient providers
//!   ├── has / health_check        <- probes that never fail the caller
//!   └── get_all_keys              <- cursor SCAN, fan-out when clustering
//! ```
//!
//! ## Design Decisions
//!
//! - **Compile-time codec dispatch**: scalars as text, bytes as-is, everything
//!   else through MessagePack; decode destinations are always `&mut T`
//! - **Scoped deadlines**: a builder's default deadline is cancelled when the
//!   builder is consumed or dropped; caller deadlines are only borrowed
//! - **No retries, no error logging**: every failure is returned as is
//! - **SCAN for enumeration**: never `KEYS`

pub mod codec;
pub mod connection;
pub mod deadline;
pub mod errors;
pub mod handle;
pub mod keys;
pub mod providers;
pub mod rate_limit;
pub mod remember;
pub mod request;
pub mod scanner;
pub mod traits;

mod executor;

pub use codec::{CacheCodec, CacheDecode, CacheEncode, Packed};
pub use connection::Connection;
pub use deadline::{Deadline, DeadlineScope};
pub use errors::{CacheError, CacheResult, ComputeError};
pub use handle::{CacheHandle, DependencyStats};
pub use keys::Keyer;
pub use providers::{MemoryStore, RedisClusterStore, RedisStore};
pub use request::{DeleteRequest, GetRequest, SetRequest};
pub use traits::StoreClient;
