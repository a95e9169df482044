//! StreamForge engine
//!
//! Discovers research streams in a document corpus by combining what
//! documents say (title and abstract) with what they cite:
//! - [`text`]: TF-IDF over a filtered vocabulary, reduced by truncated SVD
//! - [`coupling`]: bibliographic coupling via an inverted reference index
//! - [`fusion`]: weighted concatenation of both signals
//! - [`cluster`]: Ward clustering for Level 1, NMF for Levels 2 and 3
//! - [`labels`]: top terms per topic node
//! - [`pipeline`]: the batch run tying the stages together

pub mod cluster;
pub mod coupling;
pub mod fusion;
pub mod io;
pub mod labels;
pub mod pipeline;
pub mod svd;
pub mod text;

pub use pipeline::{AssignmentRow, NetworkStatistics, PipelineOutput, StreamPipeline, TopicRow};
