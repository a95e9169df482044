//! Queue-driven construction of the three-level topic tree
//!
//! Level 1 partitions the fused vectors. Each following level takes the
//! previous level's nodes as its frontier and subdivides every node
//! independently by factorizing its members' TF-IDF rows. A node that is
//! too small, has no text signal, or has no usable candidate is carried
//! down unchanged as a single passthrough child. Members of a subdivided
//! node that carry no text (placed by coupling alone) get no topic; they
//! are collected in a residual child that carries the parent's label.

use super::nmf::{factorize, Factorization, NmfConfig};
use super::quality::{select_best, Evaluated, QualityMetric};
use super::ward::WardClustering;
use super::{ClusterTree, NodeId, NodeKind};
use crate::fusion::FusedFeatures;
use crate::labels::TopicLabeler;
use crate::text::TermMatrix;
use ndarray::Axis;
use rayon::prelude::*;
use streamforge_common::config::ClusteringConfig;
use streamforge_common::errors::EngineError;
use streamforge_common::metrics::{record_level, record_level1_quality};
use streamforge_common::UNCLASSIFIED_PATH;
use tracing::{debug, info};

/// Finished hierarchy with Level-1 diagnostics
#[derive(Debug, Clone)]
pub struct Hierarchy {
    pub tree: ClusterTree,
    /// Number of Level-1 streams, excluding the unclassified bucket
    pub level1_k: usize,
    /// Mean silhouette width of the selected Level-1 partition
    pub level1_quality: f64,
    /// Documents placed in the unclassified bucket
    pub unclassified: usize,
    /// Skipped candidates per level
    pub skipped_candidates: [usize; 3],
}

/// Outcome of trying to subdivide one node
#[derive(Debug)]
enum Subdivision {
    /// Keep the node whole at the next level
    Passthrough { skipped: usize },
    /// Child groups with their topic-term loadings (global columns), plus
    /// members without any topic weight
    Split {
        k: usize,
        score: f64,
        groups: Vec<(Vec<usize>, Vec<(usize, f64)>)>,
        residual: Vec<usize>,
        skipped: usize,
    },
}

/// Builds the topic tree from fused vectors and the TF-IDF matrix
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    config: ClusteringConfig,
    labeler: TopicLabeler,
}

impl HierarchyBuilder {
    pub fn new(config: ClusteringConfig, labeler: TopicLabeler) -> Self {
        Self { config, labeler }
    }

    /// Build all three levels.
    ///
    /// Every document ends up in exactly one Level-1 node. Documents with
    /// an all-zero fused vector go to the unclassified node and are left
    /// out of clustering and scoring.
    pub fn build(&self, fused: &FusedFeatures, terms: &TermMatrix) -> Hierarchy {
        let mut tree = ClusterTree::new();
        let n = fused.vectors.nrows();

        let (classified, unclassified): (Vec<usize>, Vec<usize>) =
            (0..n).partition(|&row| !fused.is_empty_row(row));

        let mut skipped_candidates = [0usize; 3];
        let mut level1_k = 0;
        let mut level1_quality = 0.0;

        if !classified.is_empty() {
            let points = fused.vectors.select(Axis(0), &classified);
            let (selected, skipped) =
                WardClustering::new(&self.config.level1_candidates).fit(points.view());
            skipped_candidates[0] = skipped;

            let k = selected.assignments.iter().copied().max().map_or(0, |m| m + 1);
            let mut groups = vec![Vec::new(); k];
            for (&row, &cluster) in classified.iter().zip(selected.assignments.iter()) {
                groups[cluster].push(row);
            }
            for (i, members) in groups.into_iter().enumerate() {
                let id = tree.add_root((i + 1).to_string(), NodeKind::Cluster, members);
                tree.node_mut(id).quality = Some(selected.score);
            }
            level1_k = k;
            level1_quality = selected.score;
        }

        if !unclassified.is_empty() {
            info!(
                documents = unclassified.len(),
                "Documents without text or coupling signal placed in the unclassified bucket"
            );
            tree.add_root(UNCLASSIFIED_PATH, NodeKind::Unclassified, unclassified.clone());
        }

        let level1 = tree.level_ids(1);
        self.label(&mut tree, &level1, terms);
        record_level(1, level1.len(), skipped_candidates[0]);
        record_level1_quality(level1_quality, unclassified.len());

        let mut frontier: Vec<NodeId> = level1
            .into_iter()
            .filter(|&id| tree.node(id).kind != NodeKind::Unclassified)
            .collect();

        for level in 2..=3u8 {
            let (next, skipped) = self.expand_level(&mut tree, &frontier, level, terms);
            self.label(&mut tree, &next, terms);
            skipped_candidates[usize::from(level) - 1] = skipped;
            record_level(level, next.len(), skipped);

            info!(level, parents = frontier.len(), nodes = next.len(), skipped, "Hierarchy level built");
            frontier = next;
        }

        Hierarchy {
            tree,
            level1_k,
            level1_quality,
            unclassified: unclassified.len(),
            skipped_candidates,
        }
    }

    /// Subdivide every frontier node; returns the new node ids in order
    fn expand_level(
        &self,
        tree: &mut ClusterTree,
        frontier: &[NodeId],
        level: u8,
        terms: &TermMatrix,
    ) -> (Vec<NodeId>, usize) {
        let candidates = self.config.candidates_for_level(level);

        let outcomes: Vec<Subdivision> = {
            let snapshot: &ClusterTree = tree;
            frontier
                .par_iter()
                .map(|&id| {
                    let node = snapshot.node(id);
                    self.subdivide(&node.path, &node.members, candidates, terms)
                })
                .collect()
        };

        let mut created = Vec::new();
        let mut skipped_total = 0;

        for (&parent, outcome) in frontier.iter().zip(outcomes) {
            match outcome {
                Subdivision::Passthrough { skipped } => {
                    skipped_total += skipped;
                    let members = tree.node(parent).members.clone();
                    created.push(tree.add_child(parent, NodeKind::Passthrough, members, None));
                    tree.node_mut(parent).selected_k = Some(1);
                }
                Subdivision::Split {
                    k,
                    score,
                    groups,
                    residual,
                    skipped,
                } => {
                    skipped_total += skipped;
                    for (members, loadings) in groups {
                        created.push(tree.add_child(parent, NodeKind::Cluster, members, Some(loadings)));
                    }
                    if !residual.is_empty() {
                        created.push(tree.add_child(parent, NodeKind::Residual, residual, None));
                    }
                    let node = tree.node_mut(parent);
                    node.selected_k = Some(k);
                    node.quality = Some(score);
                }
            }
        }

        (created, skipped_total)
    }

    /// Pick the best factorization of one node's members
    fn subdivide(&self, path: &str, members: &[usize], candidates: &[usize], terms: &TermMatrix) -> Subdivision {
        if members.len() < self.config.min_subdivision_size {
            debug!(
                path,
                members = members.len(),
                threshold = self.config.min_subdivision_size,
                "Node below subdivision threshold"
            );
            return Subdivision::Passthrough { skipped: 0 };
        }

        let (block, columns) = terms.submatrix(members);
        if block.nnz() == 0 {
            debug!(path, "Node has no text signal; not subdivided");
            return Subdivision::Passthrough { skipped: 0 };
        }

        let metric = QualityMetric::PenalizedReconstruction {
            penalty: self.config.complexity_penalty,
        };

        let mut ks = candidates.to_vec();
        ks.sort_unstable();
        ks.dedup();

        let mut skipped = 0;
        let mut evaluated: Vec<Evaluated<Factorization>> = Vec::new();

        for k in ks {
            if k < 2 || k > members.len() {
                let err = EngineError::DegenerateCluster {
                    path: path.to_string(),
                    k,
                    members: members.len(),
                };
                debug!(error = %err, "Skipping candidate");
                skipped += 1;
                continue;
            }

            let nmf = NmfConfig {
                max_iterations: self.config.nmf_max_iterations,
                tolerance: self.config.nmf_tolerance,
                seed: node_seed(self.config.seed, path, k),
            };
            let factorization = factorize(&block, k, &nmf);
            let score = metric.penalize(factorization.relative_error, k);
            debug!(
                path,
                k,
                relative_error = factorization.relative_error,
                score,
                iterations = factorization.iterations,
                "Candidate factorized"
            );

            // Index `k` marks members with no topic weight
            let assignments = factorization
                .dominant_topics()
                .into_iter()
                .map(|topic| topic.unwrap_or(k))
                .collect();
            evaluated.push(Evaluated {
                k,
                score,
                assignments,
                payload: factorization,
            });
        }

        let Some(best) = select_best(&metric, evaluated) else {
            debug!(path, members = members.len(), skipped, "No usable candidate; node kept whole");
            return Subdivision::Passthrough { skipped };
        };

        let groups: Vec<(Vec<usize>, Vec<(usize, f64)>)> = (0..best.k)
            .filter_map(|topic| {
                let group: Vec<usize> = members
                    .iter()
                    .zip(best.assignments.iter())
                    .filter(|&(_, &t)| t == topic)
                    .map(|(&row, _)| row)
                    .collect();
                if group.is_empty() {
                    return None;
                }
                let loadings = best
                    .payload
                    .topic_terms(topic)
                    .into_iter()
                    .map(|(local, weight)| (columns[local], weight))
                    .collect();
                Some((group, loadings))
            })
            .collect();

        let residual: Vec<usize> = members
            .iter()
            .zip(best.assignments.iter())
            .filter(|&(_, &t)| t == best.k)
            .map(|(&row, _)| row)
            .collect();
        if !residual.is_empty() {
            debug!(path, documents = residual.len(), "Members without text kept in a residual child");
        }

        Subdivision::Split {
            k: best.k,
            score: best.score,
            groups,
            residual,
            skipped,
        }
    }

    /// Label `ids`; a node whose members have no terms takes its parent's label
    fn label(&self, tree: &mut ClusterTree, ids: &[NodeId], terms: &TermMatrix) {
        let snapshot: &ClusterTree = tree;
        let labels: Vec<Vec<String>> = ids
            .par_iter()
            .map(|&id| {
                let node = snapshot.node(id);
                let label = self.labeler.label_node(node, terms);
                match node.parent {
                    Some(parent) if label.is_empty() => snapshot.node(parent).label.clone(),
                    _ => label,
                }
            })
            .collect();
        for (&id, label) in ids.iter().zip(labels) {
            tree.node_mut(id).label = label;
        }
    }
}

/// Per-node factorization seed: run seed mixed with an FNV-1a hash of the
/// path and the candidate count
fn node_seed(seed: u64, path: &str, k: usize) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in path.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    seed ^ hash ^ (k as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterNode;
    use crate::fusion::FusionMode;
    use crate::text::{build_term_matrix, FrequencyBand, Tokenizer};
    use ndarray::Array2;

    fn terms(texts: &[&str]) -> TermMatrix {
        let texts: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        let band = FrequencyBand {
            min_count: 1,
            min_fraction: 0.0,
            max_fraction: 1.0,
        };
        build_term_matrix(&texts, &Tokenizer::new(3).unwrap(), &band)
    }

    fn fused(rows: &[[f64; 2]]) -> FusedFeatures {
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        FusedFeatures {
            vectors: Array2::from_shape_vec((rows.len(), 2), flat).unwrap(),
            text_columns: 2,
            coupling_columns: 0,
            mode: FusionMode::TextOnly,
        }
    }

    fn config(min_subdivision_size: usize) -> ClusteringConfig {
        ClusteringConfig {
            level1_candidates: vec![2, 3],
            level2_candidates: vec![2],
            level3_candidates: vec![2],
            min_subdivision_size,
            ..ClusteringConfig::default()
        }
    }

    fn corpus() -> (FusedFeatures, TermMatrix) {
        let texts = [
            "graph citation coupling",
            "graph citation network",
            "protein folding structure",
            "protein folding dynamics",
            "graph citation coupling",
            "protein folding structure",
            "",
        ];
        let vectors = fused(&[
            [1.0, 0.0],
            [0.9, 0.1],
            [0.0, 1.0],
            [0.1, 0.9],
            [1.0, 0.05],
            [0.05, 1.0],
            [0.0, 0.0],
        ]);
        (vectors, terms(&texts))
    }

    #[test]
    fn test_every_document_has_one_level1_node() {
        let (fused, terms) = corpus();
        let h = HierarchyBuilder::new(config(10), TopicLabeler::new(3)).build(&fused, &terms);

        assert_eq!(h.level1_k, 2);
        assert_eq!(h.unclassified, 1);
        let memberships = h.tree.memberships(7);
        assert!(memberships.iter().all(|m| m[0].is_some()));

        let bucket = h.tree.get(UNCLASSIFIED_PATH).unwrap();
        assert_eq!(bucket.members, vec![6]);
        assert!(memberships[6][1].is_none());
        assert_eq!(h.tree.get("1").unwrap().members, vec![0, 1, 4]);
        assert_eq!(h.tree.get("2").unwrap().members, vec![2, 3, 5]);
    }

    #[test]
    fn test_small_nodes_pass_through_unchanged() {
        let (fused, terms) = corpus();
        let h = HierarchyBuilder::new(config(10), TopicLabeler::new(3)).build(&fused, &terms);

        let child = h.tree.get("1.1").unwrap();
        assert_eq!(child.kind, NodeKind::Passthrough);
        assert_eq!(child.members, h.tree.get("1").unwrap().members);
        assert_eq!(h.tree.get("1.1.1").unwrap().members, child.members);
        assert!(h.tree.get("1.2").is_none());
    }

    #[test]
    fn test_level2_children_partition_parent() {
        let (fused, terms) = corpus();
        let h = HierarchyBuilder::new(config(2), TopicLabeler::new(3)).build(&fused, &terms);

        for id in h.tree.level_ids(1) {
            let parent = h.tree.node(id);
            if parent.kind == NodeKind::Unclassified {
                continue;
            }
            let mut union: Vec<usize> = parent
                .children
                .iter()
                .flat_map(|&c| h.tree.node(c).members.clone())
                .collect();
            union.sort_unstable();
            assert_eq!(union, parent.members);
        }
    }

    #[test]
    fn test_oversized_candidates_keep_node_whole() {
        let (fused, terms) = corpus();
        let mut cfg = config(2);
        cfg.level2_candidates = vec![50];
        let h = HierarchyBuilder::new(cfg, TopicLabeler::new(3)).build(&fused, &terms);

        let child = h.tree.get("2.1").unwrap();
        assert_eq!(child.kind, NodeKind::Passthrough);
        assert_eq!(child.members, vec![2, 3, 5]);
        assert!(h.skipped_candidates[1] >= 2);
    }

    #[test]
    fn test_labels_assigned_at_every_level() {
        let (fused, terms) = corpus();
        let h = HierarchyBuilder::new(config(10), TopicLabeler::new(2)).build(&fused, &terms);

        assert_eq!(h.tree.get("2").unwrap().label, vec!["folding", "protein"]);
        assert_eq!(h.tree.get("2.1.1").unwrap().label, vec!["folding", "protein"]);
        assert_eq!(h.tree.get(UNCLASSIFIED_PATH).unwrap().label, vec!["unclassified"]);
    }

    #[test]
    fn test_textless_coupled_members_go_to_residual_child() {
        // Rows 4 and 5 have no text but sit with stream 1 through coupling
        let texts = [
            "graph citation coupling",
            "graph citation network",
            "protein folding structure",
            "protein folding dynamics",
            "",
            "",
            "neural network training",
            "neural network inference",
        ];
        let vectors = fused(&[
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [0.0, 1.0],
        ]);
        let h = HierarchyBuilder::new(config(2), TopicLabeler::new(2)).build(&vectors, &terms(&texts));

        let stream = h.tree.get("1").unwrap();
        assert_eq!(stream.members, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(stream.selected_k, Some(2));

        let children: Vec<&ClusterNode> = stream.children.iter().map(|&c| h.tree.node(c)).collect();
        let residual: Vec<&&ClusterNode> = children.iter().filter(|c| c.kind == NodeKind::Residual).collect();
        assert_eq!(residual.len(), 1);
        assert_eq!(residual[0].members, vec![4, 5]);
        assert_eq!(residual[0].label, stream.label);
        assert!(children
            .iter()
            .filter(|c| c.kind == NodeKind::Cluster)
            .all(|c| !c.members.contains(&4) && !c.members.contains(&5)));

        let memberships = h.tree.memberships(texts.len());
        assert_eq!(memberships[4][1], memberships[5][1]);
        assert_ne!(memberships[4][1], memberships[0][1]);
        let leaf = h.tree.node(memberships[4][2].unwrap());
        assert_eq!(leaf.kind, NodeKind::Passthrough);
        assert_eq!(leaf.label, stream.label);
    }

    #[test]
    fn test_node_seed_varies_with_path_and_k() {
        assert_ne!(node_seed(42, "1", 2), node_seed(42, "2", 2));
        assert_ne!(node_seed(42, "1", 2), node_seed(42, "1", 3));
        assert_eq!(node_seed(42, "1.2", 3), node_seed(42, "1.2", 3));
    }
}
