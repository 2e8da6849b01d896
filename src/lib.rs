#![allow(clippy::doc_markdown)] // Allow technical terms like MessagePack, Redis in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Typed Cache
//!
//! A typed caching facade over Redis (standalone, cluster or sentinel).
//!
//! ## Overview
//!
//! The crate holds no data itself. It qualifies keys with a namespace,
//! encodes values so that scalars stay readable in the backend, bounds every
//! round-trip with a deadline and adds a few higher-level operations on top
//! of plain get/set/delete.
//!
//! ## Key Features
//!
//! - **Typed Codec**: text and bytes pass through, scalars are stored as text,
//!   structured types as MessagePack
//! - **Request Builders**: chainable, single-use get/set/delete requests
//! - **Remember**: read-through get-or-compute-and-store
//! - **Rate Limiting**: one admission per window via atomic conditional create
//! - **Key Scanning**: cursor-based, fanned out over cluster masters
//!
//! ## Module Organization
//!
//! - [`cache`] - Handle, request builders, codec and store providers
//! - [`config`] - Configuration loading from environment or files
//! - [`constants`] - Key layout and default lifetimes
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use typed_cache::cache::CacheHandle;
//! use std::time::Duration;
//!
//! # async fn example() -> typed_cache::cache::CacheResult<()> {
//! typed_cache::logging::init_structured_logging();
//!
//! let mut cache = CacheHandle::from_env();
//! cache.open().await?;
//!
//! cache
//!     .set(None, "session-1")
//!     .set_prefix("auth")
//!     .set_ttl(Duration::from_secs(900))
//!     .put("user-42")
//!     .await?;
//!
//! let user: String = cache.get(None, "session-1", "auth").pull().await?;
//! println!("session owner: {user}");
//!
//! cache.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit and integration tests run against the in-process store. Tests that
//! need a live Redis are behind the `test-services` feature:
//!
//! ```bash
//! cargo test                              # In-process tests
//! cargo test --features test-services     # Plus live Redis tests
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod logging;

pub use cache::{CacheError, CacheHandle, CacheResult, Deadline, Keyer, MemoryStore};
pub use config::{CacheConfig, ConfigLoader};
