//! Cache error types

use thiserror::Error;

/// Boxed error returned by a caller-supplied compute function
pub type ComputeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during cache operations
///
/// Backend failures keep the originating `redis::RedisError` as their source
/// and add the operation and fully-qualified key they happened on.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No backend connection is open
    #[error("cache client is not open")]
    ClientNil,

    /// Cluster fan-out requested on a connection without per-node access
    #[error("cache is set to cluster mode, but the connection is not a cluster connection")]
    ClientNotCluster,

    /// Base key was empty when the request reached the executor
    #[error("cache key cannot be empty")]
    EmptyKey,

    /// Scan prefix was empty
    #[error("prefix cannot be empty")]
    EmptyPrefix,

    /// Remember's computed value cannot be converted into the destination type
    #[error("cannot assign value of type {actual} to out of type {expected}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Generic binary serialization failed
    #[error("failed to encode value {type_name}: {source}")]
    Encode {
        type_name: &'static str,
        #[source]
        source: rmp_serde::encode::Error,
    },

    /// Generic binary deserialization failed
    #[error("failed to decode value to {type_name}: {source}")]
    Decode {
        type_name: &'static str,
        #[source]
        source: rmp_serde::decode::Error,
    },

    /// Stored bytes are not a valid textual representation of the scalar
    #[error("failed to parse {value:?} as {type_name}: {reason}")]
    Parse {
        type_name: &'static str,
        value: String,
        reason: String,
    },

    /// Key is absent in the backend
    #[error("cache key not found: {key}")]
    NotFound { key: String },

    /// Request deadline elapsed before the backend answered
    #[error("cache {operation} timed out for key {key}")]
    Timeout {
        operation: &'static str,
        key: String,
    },

    /// Request deadline was cancelled by its owner
    #[error("cache {operation} cancelled for key {key}")]
    Cancelled {
        operation: &'static str,
        key: String,
    },

    /// Backend round-trip failed
    #[error("cache {operation} failed for key {key}: {source}")]
    Backend {
        operation: &'static str,
        key: String,
        #[source]
        source: redis::RedisError,
    },

    /// Remember's compute function failed
    #[error("remember compute failed: {0}")]
    Compute(#[source] ComputeError),

    /// Connection could not be opened
    #[error("cache connection error: {0}")]
    Connection(String),
}

impl CacheError {
    pub(crate) fn backend(
        operation: &'static str,
        key: impl Into<String>,
        source: redis::RedisError,
    ) -> Self {
        Self::Backend {
            operation,
            key: key.into(),
            source,
        }
    }

    /// Whether this error reports a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
