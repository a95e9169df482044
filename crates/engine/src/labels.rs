//! Topic labels: the top-weighted vocabulary terms of a cluster node

use crate::cluster::{ClusterNode, NodeKind};
use crate::text::TermMatrix;
use std::collections::BTreeMap;
use streamforge_common::config::LabelConfig;
use streamforge_common::UNCLASSIFIED_LABEL;

/// Ranks vocabulary terms for a node and keeps the strongest ones
#[derive(Debug, Clone)]
pub struct TopicLabeler {
    top_terms: usize,
}

impl TopicLabeler {
    pub fn new(top_terms: usize) -> Self {
        Self {
            top_terms: top_terms.max(1),
        }
    }

    pub fn from_config(config: &LabelConfig) -> Self {
        Self::new(config.top_terms)
    }

    /// Label for a finalized node.
    ///
    /// Factorization nodes rank by their topic-term loadings, everything
    /// else by aggregate TF-IDF over the node's members.
    pub fn label_node(&self, node: &ClusterNode, terms: &TermMatrix) -> Vec<String> {
        if node.kind == NodeKind::Unclassified {
            return vec![UNCLASSIFIED_LABEL.to_string()];
        }
        match &node.term_loadings {
            Some(loadings) if !loadings.is_empty() => self.from_loadings(loadings, terms),
            _ => self.from_members(&node.members, terms),
        }
    }

    /// Top terms by summed weight across `members`
    pub fn from_members(&self, members: &[usize], terms: &TermMatrix) -> Vec<String> {
        let mut totals: BTreeMap<usize, f64> = BTreeMap::new();
        for &row in members {
            if let Some(view) = terms.matrix.outer_view(row) {
                for (col, &weight) in view.iter() {
                    *totals.entry(col).or_insert(0.0) += weight;
                }
            }
        }
        let scored: Vec<(usize, f64)> = totals.into_iter().collect();
        self.top(scored, terms)
    }

    /// Top terms by (global column, loading) pairs
    pub fn from_loadings(&self, loadings: &[(usize, f64)], terms: &TermMatrix) -> Vec<String> {
        self.top(loadings.to_vec(), terms)
    }

    fn top(&self, mut scored: Vec<(usize, f64)>, terms: &TermMatrix) -> Vec<String> {
        scored.retain(|&(col, w)| w > 0.0 && col < terms.vocabulary.len());
        // Ties fall back to vocabulary order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored
            .into_iter()
            .take(self.top_terms)
            .map(|(col, _)| terms.vocabulary[col].clone())
            .collect()
    }
}

/// Comma-joined form used in the assignment table
pub fn join_label(label: &[String]) -> String {
    label.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterTree;
    use crate::text::{build_term_matrix, FrequencyBand, Tokenizer};

    fn terms() -> TermMatrix {
        let texts: Vec<String> = [
            "citation coupling network citation",
            "citation coupling graph",
            "neural topic model",
            "neural topic inference model",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let band = FrequencyBand {
            min_count: 1,
            min_fraction: 0.0,
            max_fraction: 1.0,
        };
        build_term_matrix(&texts, &Tokenizer::new(3).unwrap(), &band)
    }

    #[test]
    fn test_member_labels_rank_aggregate_weight() {
        let terms = terms();
        let label = TopicLabeler::new(2).from_members(&[0, 1], &terms);
        assert_eq!(label, vec!["citation".to_string(), "coupling".to_string()]);
    }

    #[test]
    fn test_loadings_take_precedence() {
        let terms = terms();
        let neural = terms.vocabulary.iter().position(|t| t == "neural").unwrap();
        let model = terms.vocabulary.iter().position(|t| t == "model").unwrap();

        let mut tree = ClusterTree::new();
        let root = tree.add_root("1", NodeKind::Cluster, vec![0, 1, 2, 3]);
        let child = tree.add_child(root, NodeKind::Cluster, vec![0, 1], Some(vec![(model, 0.4), (neural, 0.9)]));

        let label = TopicLabeler::new(5).label_node(tree.node(child), &terms);
        assert_eq!(label, vec!["neural".to_string(), "model".to_string()]);
    }

    #[test]
    fn test_unclassified_label() {
        let terms = terms();
        let mut tree = ClusterTree::new();
        let id = tree.add_root("0", NodeKind::Unclassified, vec![]);
        assert_eq!(TopicLabeler::new(3).label_node(tree.node(id), &terms), vec![UNCLASSIFIED_LABEL]);
        assert_eq!(join_label(&["a".to_string(), "b".to_string()]), "a,b");
    }
}
