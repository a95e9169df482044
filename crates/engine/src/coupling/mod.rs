//! Bibliographic coupling network
//!
//! Builds a sparse, symmetric document-document weight matrix from shared
//! references using an inverted index, plus the network summary statistics
//! reported alongside the clustering.

mod index;
mod measure;

pub use index::{PairCounts, ReferenceIndex};
pub use measure::CouplingNormalizer;

use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use streamforge_common::config::CouplingConfig;
use streamforge_common::{CouplingMeasure, Document};
use tracing::{info, warn};

/// Undirected coupling edge, `source < target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingEdge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// Summary statistics of the coupling network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouplingStats {
    /// Documents in the corpus
    pub documents: usize,

    /// Documents citing at least one reference
    pub documents_with_references: usize,

    /// documents_with_references / documents
    pub reference_fraction: f64,

    /// Total (reference, citing document) associations
    pub total_references: usize,

    /// Distinct cited identifiers
    pub distinct_references: usize,

    /// Mean distinct references per document
    pub mean_references: f64,

    /// Undirected edges kept after normalization and thresholding
    pub edge_count: usize,

    /// Mean weight over kept edges
    pub mean_weight: f64,

    /// edge_count / (n * (n - 1) / 2)
    pub density: f64,

    /// 1 - density
    pub sparsity: f64,

    /// Pairs enumerated from reference buckets
    pub pair_visits: u64,
}

/// Sparse symmetric coupling matrix with its statistics
#[derive(Debug, Clone)]
pub struct CouplingNetwork {
    /// n x n, symmetric, empty diagonal (CSR)
    pub matrix: CsMat<f64>,
    pub stats: CouplingStats,
}

impl CouplingNetwork {
    /// Coupling weight between two documents; 0 when not coupled
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        self.matrix.get(i, j).copied().unwrap_or(0.0)
    }

    /// Whether the network has no edges at all
    pub fn is_empty(&self) -> bool {
        self.stats.edge_count == 0
    }

    /// Number of documents coupled to `row`
    pub fn degree(&self, row: usize) -> usize {
        self.matrix.outer_view(row).map(|r| r.nnz()).unwrap_or(0)
    }

    /// Each undirected edge once, ordered by `(source, target)`
    pub fn edges(&self) -> Vec<CouplingEdge> {
        let mut edges = Vec::with_capacity(self.stats.edge_count);
        for (source, row) in self.matrix.outer_iterator().enumerate() {
            for (target, &weight) in row.iter() {
                if source < target {
                    edges.push(CouplingEdge {
                        source,
                        target,
                        weight,
                    });
                }
            }
        }
        edges
    }
}

/// Builds a [`CouplingNetwork`] under a pluggable normalization
pub struct CouplingBuilder<N: CouplingNormalizer = CouplingMeasure> {
    normalizer: N,
    min_weight: f64,
}

impl CouplingBuilder<CouplingMeasure> {
    /// Create a builder from configuration
    pub fn from_config(config: &CouplingConfig) -> Self {
        Self::new(config.measure, config.min_weight)
    }
}

impl<N: CouplingNormalizer> CouplingBuilder<N> {
    pub fn new(normalizer: N, min_weight: f64) -> Self {
        Self {
            normalizer,
            min_weight,
        }
    }

    /// Build the coupling network for `documents` (rows follow input order).
    ///
    /// Documents without references get an empty row. A corpus without any
    /// citation data yields an empty network rather than an error.
    pub fn build(&self, documents: &[Document]) -> CouplingNetwork {
        let index = ReferenceIndex::from_documents(documents);
        self.build_from_index(&index)
    }

    /// Build from a prepared inverted index
    pub fn build_from_index(&self, index: &ReferenceIndex) -> CouplingNetwork {
        let n = index.document_count();
        let (counts, pair_visits) = index.shared_counts();

        let mut pairs: Vec<((u32, u32), u32)> = counts.into_iter().collect();
        pairs.sort_unstable_by_key(|&(pair, _)| pair);

        let mut tri = TriMat::with_capacity((n, n), pairs.len() * 2);
        let mut edge_count = 0usize;
        let mut weight_sum = 0.0;

        for ((i, j), shared) in pairs {
            let (i, j) = (i as usize, j as usize);
            let weight = self.normalizer.normalize(
                shared,
                index.reference_count(i),
                index.reference_count(j),
            );
            if weight <= self.min_weight {
                continue;
            }
            tri.add_triplet(i, j, weight);
            tri.add_triplet(j, i, weight);
            edge_count += 1;
            weight_sum += weight;
        }

        let documents_with_references = index.documents_with_references();
        let total_references = index.total_associations();
        let possible_pairs = if n > 1 { (n * (n - 1) / 2) as f64 } else { 0.0 };
        let density = if possible_pairs > 0.0 {
            edge_count as f64 / possible_pairs
        } else {
            0.0
        };

        let stats = CouplingStats {
            documents: n,
            documents_with_references,
            reference_fraction: ratio(documents_with_references as f64, n as f64),
            total_references,
            distinct_references: index.distinct_references(),
            mean_references: ratio(total_references as f64, n as f64),
            edge_count,
            mean_weight: ratio(weight_sum, edge_count as f64),
            density,
            sparsity: 1.0 - density,
            pair_visits,
        };

        if documents_with_references == 0 {
            warn!("No citation data in corpus; clustering degrades to text-only similarity");
        } else if edge_count == 0 {
            warn!("No two documents share a reference; coupling contributes nothing");
        }

        info!(
            measure = self.normalizer.name(),
            documents = n,
            documents_with_references,
            edges = edge_count,
            pair_visits,
            density,
            "Coupling network built"
        );

        CouplingNetwork {
            matrix: tri.to_csr(),
            stats,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
