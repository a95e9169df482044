//! Configuration management for the StreamForge engine
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! A configuration is immutable for the duration of a run and must pass
//! [`EngineConfig::ensure_valid`] before any computation starts.

use crate::errors::{EngineError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;

/// Main engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct EngineConfig {
    /// Text feature configuration
    #[serde(default)]
    #[validate(nested)]
    pub text: TextConfig,

    /// Citation coupling configuration
    #[serde(default)]
    #[validate(nested)]
    pub coupling: CouplingConfig,

    /// Hybrid fusion weights
    #[serde(default)]
    #[validate(nested)]
    pub fusion: FusionConfig,

    /// Hierarchical clustering configuration
    #[serde(default)]
    #[validate(nested)]
    pub clustering: ClusteringConfig,

    /// Topic label configuration
    #[serde(default)]
    #[validate(nested)]
    pub labels: LabelConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Input/output locations for the batch runner
    #[serde(default)]
    pub io: IoConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TextConfig {
    /// Terms must appear in at least this many documents
    #[serde(default = "default_min_document_count")]
    #[validate(range(min = 1))]
    pub min_document_count: usize,

    /// Terms must appear in at least this fraction of documents
    #[serde(default = "default_min_document_fraction")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_document_fraction: f64,

    /// Terms appearing in more than this fraction of documents are dropped
    #[serde(default = "default_max_document_fraction")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_document_fraction: f64,

    /// Target dimensionality of the latent semantic space
    #[serde(default = "default_latent_dimensions")]
    #[validate(range(min = 1))]
    pub latent_dimensions: usize,

    /// Shortest token kept by the tokenizer
    #[serde(default = "default_min_token_length")]
    #[validate(range(min = 1))]
    pub min_token_length: usize,

    /// Extra random directions used by the truncated SVD
    #[serde(default = "default_svd_oversampling")]
    pub svd_oversampling: usize,

    /// Subspace power iterations used by the truncated SVD
    #[serde(default = "default_svd_power_iterations")]
    pub svd_power_iterations: usize,
}

/// Normalization applied to a pair's shared-reference count
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CouplingMeasure {
    /// Raw number of shared references
    SharedCount,
    /// Shared references over the union of both reference sets
    #[default]
    Jaccard,
    /// Shared references over the geometric mean of both set sizes
    Cosine,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CouplingConfig {
    /// Normalization applied to shared-reference counts
    #[serde(default)]
    pub measure: CouplingMeasure,

    /// Pairs whose normalized weight is at or below this value are dropped
    #[serde(default = "default_min_coupling_weight")]
    #[validate(range(min = 0.0))]
    pub min_weight: f64,

    /// Columns of the coupling summary block fed to the fuser
    #[serde(default = "default_coupling_dimensions")]
    #[validate(range(min = 1))]
    pub dimensions: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct FusionConfig {
    /// Weight of the text block; only the ratio to coupling_weight matters
    #[serde(default = "default_text_weight")]
    #[validate(range(min = 0.0))]
    pub text_weight: f64,

    /// Weight of the coupling block
    #[serde(default = "default_coupling_weight")]
    #[validate(range(min = 0.0))]
    pub coupling_weight: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ClusteringConfig {
    /// Candidate stream counts for the corpus-wide level
    #[serde(default = "default_level1_candidates")]
    #[validate(length(min = 1))]
    pub level1_candidates: Vec<usize>,

    /// Candidate sub-stream counts per Level-1 node
    #[serde(default = "default_level2_candidates")]
    #[validate(length(min = 1))]
    pub level2_candidates: Vec<usize>,

    /// Candidate micro-topic counts per Level-2 node
    #[serde(default = "default_level3_candidates")]
    #[validate(length(min = 1))]
    pub level3_candidates: Vec<usize>,

    /// Nodes with fewer members are not subdivided
    #[serde(default = "default_min_subdivision_size")]
    #[validate(range(min = 2))]
    pub min_subdivision_size: usize,

    /// Penalty added per topic to the relative reconstruction error
    #[serde(default = "default_complexity_penalty")]
    #[validate(range(min = 0.0))]
    pub complexity_penalty: f64,

    /// Iteration cap for the non-negative factorization
    #[serde(default = "default_nmf_max_iterations")]
    #[validate(range(min = 1))]
    pub nmf_max_iterations: usize,

    /// Relative error change below which the factorization stops
    #[serde(default = "default_nmf_tolerance")]
    #[validate(range(min = 0.0))]
    pub nmf_tolerance: f64,

    /// Seed for every randomized step
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LabelConfig {
    /// Number of terms kept per node label
    #[serde(default = "default_top_terms")]
    #[validate(range(min = 1))]
    pub top_terms: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Write Prometheus exposition text next to the outputs
    #[serde(default = "default_export_metrics")]
    pub export_metrics: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IoConfig {
    /// JSON array or JSON-lines file of documents
    #[serde(default = "default_input_path")]
    pub input_path: String,

    /// Directory receiving the output tables
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

// Default value functions
fn default_min_document_count() -> usize { 2 }
fn default_min_document_fraction() -> f64 { 0.0005 }
fn default_max_document_fraction() -> f64 { 0.8 }
fn default_latent_dimensions() -> usize { 200 }
fn default_min_token_length() -> usize { 3 }
fn default_svd_oversampling() -> usize { 10 }
fn default_svd_power_iterations() -> usize { 4 }
fn default_min_coupling_weight() -> f64 { 0.0 }
fn default_coupling_dimensions() -> usize { 50 }
fn default_text_weight() -> f64 { 1.0 }
fn default_coupling_weight() -> f64 { 1.0 }
fn default_level1_candidates() -> Vec<usize> { vec![4, 6, 8, 10, 12] }
fn default_level2_candidates() -> Vec<usize> { vec![2, 3, 4, 5] }
fn default_level3_candidates() -> Vec<usize> { vec![2, 3, 4] }
fn default_min_subdivision_size() -> usize { 10 }
fn default_complexity_penalty() -> f64 { 0.01 }
fn default_nmf_max_iterations() -> usize { 200 }
fn default_nmf_tolerance() -> f64 { 1e-4 }
fn default_seed() -> u64 { 42 }
fn default_top_terms() -> usize { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_export_metrics() -> bool { true }
fn default_input_path() -> String { "data/documents.json".to_string() }
fn default_output_dir() -> String { "output".to_string() }

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            min_document_count: default_min_document_count(),
            min_document_fraction: default_min_document_fraction(),
            max_document_fraction: default_max_document_fraction(),
            latent_dimensions: default_latent_dimensions(),
            min_token_length: default_min_token_length(),
            svd_oversampling: default_svd_oversampling(),
            svd_power_iterations: default_svd_power_iterations(),
        }
    }
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            measure: CouplingMeasure::default(),
            min_weight: default_min_coupling_weight(),
            dimensions: default_coupling_dimensions(),
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            text_weight: default_text_weight(),
            coupling_weight: default_coupling_weight(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            level1_candidates: default_level1_candidates(),
            level2_candidates: default_level2_candidates(),
            level3_candidates: default_level3_candidates(),
            min_subdivision_size: default_min_subdivision_size(),
            complexity_penalty: default_complexity_penalty(),
            nmf_max_iterations: default_nmf_max_iterations(),
            nmf_tolerance: default_nmf_tolerance(),
            seed: default_seed(),
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            top_terms: default_top_terms(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            export_metrics: default_export_metrics(),
        }
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_dir: default_output_dir(),
        }
    }
}

impl ClusteringConfig {
    /// Candidate counts for a hierarchy level (1, 2 or 3)
    pub fn candidates_for_level(&self, level: u8) -> &[usize] {
        match level {
            1 => &self.level1_candidates,
            2 => &self.level2_candidates,
            _ => &self.level3_candidates,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__FUSION__COUPLING_WEIGHT=0.5
            .add_source(Self::environment())

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Self::environment())
            .build()?;

        config.try_deserialize()
    }

    fn environment() -> Environment {
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("clustering.level1_candidates")
            .with_list_parse_key("clustering.level2_candidates")
            .with_list_parse_key("clustering.level3_candidates")
    }

    /// Check field ranges and cross-field rules.
    ///
    /// Must succeed before the pipeline touches any document.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()?;

        let fusion = &self.fusion;
        if !fusion.text_weight.is_finite() || !fusion.coupling_weight.is_finite() {
            return Err(EngineError::config("fusion weights must be finite"));
        }
        if fusion.text_weight < 0.0 || fusion.coupling_weight < 0.0 {
            return Err(EngineError::config(format!(
                "fusion weights must be non-negative (text={}, coupling={})",
                fusion.text_weight, fusion.coupling_weight
            )));
        }
        if fusion.text_weight == 0.0 && fusion.coupling_weight == 0.0 {
            return Err(EngineError::config(
                "at least one of text_weight and coupling_weight must be positive",
            ));
        }

        let text = &self.text;
        if text.min_document_fraction >= text.max_document_fraction {
            return Err(EngineError::config(format!(
                "min_document_fraction ({}) must be below max_document_fraction ({})",
                text.min_document_fraction, text.max_document_fraction
            )));
        }

        for level in 1..=3u8 {
            let candidates = self.clustering.candidates_for_level(level);
            if let Some(&k) = candidates.iter().find(|&&k| k < 2) {
                return Err(EngineError::config(format!(
                    "level {} candidate cluster count {} is below 2",
                    level, k
                )));
            }
        }

        Ok(())
    }

    /// Hex digest of the canonical JSON form of this configuration
    pub fn config_fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }
}
