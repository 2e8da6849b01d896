//! Configuration Error Types

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// File I/O errors during configuration loading
    #[error("Failed to read configuration file '{file_path}': {error}")]
    FileReadError { file_path: String, error: String },

    /// Source could not be parsed or deserialized into `CacheConfig`
    #[error("Parse Error for source {source_name}: {reason}")]
    ParseError { source_name: String, reason: String },

    /// File extension is not one of `.env`, `.json`, `.yaml`, `.yml`, `.toml`
    #[error("Unsupported configuration file format: {file_path}")]
    UnsupportedFormat { file_path: String },
}

impl ConfigurationError {
    pub fn file_read_error<P: Into<String>, E: std::fmt::Display>(file_path: P, error: E) -> Self {
        Self::FileReadError {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }

    pub fn parse_error<S: Into<String>, E: std::fmt::Display>(source_name: S, reason: E) -> Self {
        Self::ParseError {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
