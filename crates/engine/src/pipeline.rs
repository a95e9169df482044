//! Batch pipeline: documents in, topic hierarchy and tables out
//!
//! Text features and the coupling network are built independently, fused,
//! then clustered level by level. Each stage consumes the previous stage's
//! output whole; nothing is mutated after it is built.

use crate::cluster::{ClusterTree, HierarchyBuilder, NodeKind};
use crate::coupling::{CouplingBuilder, CouplingStats};
use crate::fusion::{FusionMode, HybridFuser};
use crate::labels::{join_label, TopicLabeler};
use crate::text::build_text_features;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use streamforge_common::errors::{EngineError, Result};
use streamforge_common::metrics::{record_corpus, record_coupling, StageTimer};
use streamforge_common::{Document, EngineConfig};
use tracing::{info, instrument};

/// One row of the per-document assignment table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub id: String,
    #[serde(rename = "L1")]
    pub l1: String,
    #[serde(rename = "L2")]
    pub l2: Option<String>,
    #[serde(rename = "L3")]
    pub l3: Option<String>,
    #[serde(rename = "L1_label")]
    pub l1_label: String,
    #[serde(rename = "L2_label")]
    pub l2_label: Option<String>,
    #[serde(rename = "L3_label")]
    pub l3_label: Option<String>,
}

/// One row of a per-level topic table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRow {
    pub path: String,
    #[serde(rename = "parentPath")]
    pub parent_path: Option<String>,
    pub size: usize,
    pub label: Vec<String>,
    pub kind: NodeKind,
}

/// Network summary record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStatistics {
    #[serde(flatten)]
    pub coupling: CouplingStats,
    pub vocabulary_size: usize,
    pub explained_variance: f64,
    pub fusion_mode: FusionMode,
    pub level1_k: usize,
    pub level1_quality: f64,
    pub unclassified_documents: usize,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub assignments: Vec<AssignmentRow>,
    /// Topic tables for levels 1, 2 and 3
    pub topics: [Vec<TopicRow>; 3],
    pub network: NetworkStatistics,
    pub tree: ClusterTree,
}

impl PipelineOutput {
    /// Topic table for `level` (1, 2 or 3)
    pub fn topics_for_level(&self, level: u8) -> &[TopicRow] {
        let index = usize::from(level.clamp(1, 3)) - 1;
        &self.topics[index]
    }
}

/// Research-stream pipeline over one validated configuration
#[derive(Debug, Clone)]
pub struct StreamPipeline {
    config: EngineConfig,
}

impl StreamPipeline {
    /// Create a pipeline; the configuration is validated here, before any
    /// document is touched
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.ensure_valid()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run all stages over `documents`.
    ///
    /// Row order of every output follows input order.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn run(&self, documents: &[Document]) -> Result<PipelineOutput> {
        check_documents(documents)?;
        let config = &self.config;
        let seed = config.clustering.seed;

        let timer = StageTimer::start("features");
        let coupling_builder = CouplingBuilder::from_config(&config.coupling);
        let (text, network) = rayon::join(
            || build_text_features(documents, &config.text, seed),
            || coupling_builder.build(documents),
        );
        let text = text?;
        timer.finish();

        record_corpus(documents.len(), text.terms.n_terms(), text.explained_variance);
        record_coupling(network.stats.edge_count, network.stats.pair_visits);

        let timer = StageTimer::start("fusion");
        let fused = HybridFuser::from_config(&config.fusion, &config.coupling, &config.text, seed)
            .fuse(&text, &network);
        timer.finish();

        let timer = StageTimer::start("clustering");
        let hierarchy = HierarchyBuilder::new(
            config.clustering.clone(),
            TopicLabeler::from_config(&config.labels),
        )
        .build(&fused, &text.terms);
        timer.finish();

        let tree = hierarchy.tree;
        let assignments = assignment_table(documents, &tree);
        let topics = [topic_table(&tree, 1), topic_table(&tree, 2), topic_table(&tree, 3)];

        let network = NetworkStatistics {
            coupling: network.stats,
            vocabulary_size: text.terms.n_terms(),
            explained_variance: text.explained_variance,
            fusion_mode: fused.mode,
            level1_k: hierarchy.level1_k,
            level1_quality: hierarchy.level1_quality,
            unclassified_documents: hierarchy.unclassified,
        };

        info!(
            documents = documents.len(),
            streams = network.level1_k,
            silhouette = network.level1_quality,
            level2_nodes = topics[1].len(),
            level3_nodes = topics[2].len(),
            "Pipeline finished"
        );

        Ok(PipelineOutput {
            assignments,
            topics,
            network,
            tree,
        })
    }
}

/// Reject inputs no stage can work with
fn check_documents(documents: &[Document]) -> Result<()> {
    if documents.is_empty() {
        return Err(EngineError::EmptyCorpus);
    }
    let mut seen = HashSet::with_capacity(documents.len());
    for (row, doc) in documents.iter().enumerate() {
        if doc.id.trim().is_empty() {
            return Err(EngineError::data(format!("document at row {} has an empty id", row)));
        }
        if !seen.insert(doc.id.as_str()) {
            return Err(EngineError::data(format!("duplicate document id '{}'", doc.id)));
        }
    }
    Ok(())
}

fn assignment_table(documents: &[Document], tree: &ClusterTree) -> Vec<AssignmentRow> {
    let memberships = tree.memberships(documents.len());
    documents
        .iter()
        .zip(memberships)
        .map(|(doc, [l1, l2, l3])| {
            let path = |id: Option<usize>| id.map(|id| tree.node(id).path.clone());
            let label = |id: Option<usize>| id.map(|id| join_label(&tree.node(id).label));
            AssignmentRow {
                id: doc.id.clone(),
                l1: path(l1).unwrap_or_default(),
                l2: path(l2),
                l3: path(l3),
                l1_label: label(l1).unwrap_or_default(),
                l2_label: label(l2),
                l3_label: label(l3),
            }
        })
        .collect()
}

fn topic_table(tree: &ClusterTree, level: u8) -> Vec<TopicRow> {
    tree.level_ids(level)
        .into_iter()
        .map(|id| {
            let node = tree.node(id);
            TopicRow {
                path: node.path.clone(),
                parent_path: tree.parent_path(id).map(str::to_string),
                size: node.size(),
                label: node.label.clone(),
                kind: node.kind,
            }
        })
        .collect()
}
