//! Error types for the StreamForge engine
//!
//! Provides a small error taxonomy with:
//! - Distinct error types for unusable data, bad configuration and
//!   locally-recovered clustering failures
//! - Machine-readable error codes
//! - A fatal/recoverable split used by the pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Data errors (1xxx)
    DataError,
    EmptyCorpus,
    EmptyVocabulary,

    // Configuration errors (2xxx)
    ConfigError,
    ValidationError,
    ConfigLoadError,

    // Clustering errors (3xxx)
    DegenerateCluster,

    // Internal errors (9xxx)
    IoError,
    SerializationError,
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Data (1xxx)
            ErrorCode::DataError => 1001,
            ErrorCode::EmptyCorpus => 1002,
            ErrorCode::EmptyVocabulary => 1003,

            // Config (2xxx)
            ErrorCode::ConfigError => 2001,
            ErrorCode::ValidationError => 2002,
            ErrorCode::ConfigLoadError => 2003,

            // Clustering (3xxx)
            ErrorCode::DegenerateCluster => 3001,

            // Internal (9xxx)
            ErrorCode::IoError => 9001,
            ErrorCode::SerializationError => 9002,
            ErrorCode::InternalError => 9003,
        }
    }
}

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    // Data errors
    #[error("Data error: {message}")]
    Data { message: String },

    #[error("Corpus is empty")]
    EmptyCorpus,

    #[error("No usable vocabulary: {surviving} terms survived frequency filters (need at least 2)")]
    EmptyVocabulary { surviving: usize },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    // Clustering errors (recovered inside the engine)
    #[error("Cannot evaluate k={k} for node {path} with {members} members")]
    DegenerateCluster {
        path: String,
        k: usize,
        members: usize,
    },

    // Internal errors
    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Shorthand for a data error
    pub fn data(message: impl Into<String>) -> Self {
        EngineError::Data {
            message: message.into(),
        }
    }

    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        EngineError::Config {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Data { .. } => ErrorCode::DataError,
            EngineError::EmptyCorpus => ErrorCode::EmptyCorpus,
            EngineError::EmptyVocabulary { .. } => ErrorCode::EmptyVocabulary,
            EngineError::Config { .. } => ErrorCode::ConfigError,
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::ConfigLoad(_) => ErrorCode::ConfigLoadError,
            EngineError::DegenerateCluster { .. } => ErrorCode::DegenerateCluster,
            EngineError::Io { .. } => ErrorCode::IoError,
            EngineError::Serialization(_) => ErrorCode::SerializationError,
            EngineError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether this error aborts the run.
    ///
    /// Degenerate cluster candidates are skipped where they occur.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::DegenerateCluster { .. })
    }

    /// Whether the error comes from unusable input data
    pub fn is_data_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::DataError | ErrorCode::EmptyCorpus | ErrorCode::EmptyVocabulary
        )
    }

    /// Whether the error comes from configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::ConfigError | ErrorCode::ValidationError | ErrorCode::ConfigLoadError
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = EngineError::EmptyVocabulary { surviving: 1 };
        assert_eq!(err.code(), ErrorCode::EmptyVocabulary);
        assert_eq!(err.code().as_code(), 1003);
        assert!(err.is_data_error());
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_degenerate_cluster_is_recoverable() {
        let err = EngineError::DegenerateCluster {
            path: "3.2".into(),
            k: 5,
            members: 3,
        };
        assert!(!err.is_fatal());
        assert_eq!(err.code().as_code(), 3001);
        assert!(err.to_string().contains("3.2"));
    }

    #[test]
    fn test_config_error() {
        let err = EngineError::config("negative weight");
        assert!(err.is_fatal());
        assert!(err.is_config_error());
        assert_eq!(err.code(), ErrorCode::ConfigError);
    }
}
