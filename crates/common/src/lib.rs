//! StreamForge Common Library
//!
//! Shared code for the StreamForge research-stream engine including:
//! - Document model
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use config::{CouplingMeasure, EngineConfig};
pub use errors::{EngineError, ErrorCode, Result};
pub use models::Document;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Label used for documents with neither usable text nor coupling edges
pub const UNCLASSIFIED_LABEL: &str = "unclassified";

/// Path of the Level-1 node holding unclassified documents
pub const UNCLASSIFIED_PATH: &str = "0";
