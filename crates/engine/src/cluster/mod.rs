//! Three-level hierarchical clustering
//!
//! - Level 1: Ward agglomerative clustering over fused vectors, k chosen by
//!   silhouette width
//! - Level 2: non-negative factorization of each Level-1 node's TF-IDF rows
//! - Level 3: the same factorization inside each Level-2 node
//!
//! Nodes live in an arena ([`ClusterTree`]) addressed by id or by their
//! hierarchical path (`"3"`, `"3.2"`, `"3.2.1"`).

mod hierarchy;
mod nmf;
mod quality;
mod ward;

pub use hierarchy::HierarchyBuilder;
pub use nmf::{factorize, Factorization, NmfConfig};
pub use quality::{mean_silhouette, select_best, CondensedDistances, Evaluated, QualityMetric};
pub use ward::{Dendrogram, WardClustering};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a node in the arena
pub type NodeId = usize;

/// How a node came to exist
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Produced by a clustering or factorization step
    Cluster,
    /// Parent was not subdivided; same members as the parent
    Passthrough,
    /// Members of a subdivided parent with no text to factorize
    Residual,
    /// Documents with neither usable text nor coupling edges
    Unclassified,
}

/// One node of the topic hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    /// Hierarchical identifier, e.g. "3.2"
    pub path: String,

    /// 1, 2 or 3
    pub level: u8,

    pub kind: NodeKind,

    pub parent: Option<NodeId>,

    pub children: Vec<NodeId>,

    /// Document rows, ascending
    pub members: Vec<usize>,

    /// Top descriptive terms
    pub label: Vec<String>,

    /// Topic-term loadings (global vocabulary column, weight) for
    /// factorization-derived nodes
    #[serde(skip)]
    pub term_loadings: Option<Vec<(usize, f64)>>,

    /// Number of children selected when this node was subdivided
    pub selected_k: Option<usize>,

    /// Quality score of the selected subdivision
    pub quality: Option<f64>,
}

impl ClusterNode {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Last path segment as a number ("3.2" -> 2)
    pub fn index(&self) -> usize {
        self.path
            .rsplit('.')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

/// Arena of cluster nodes indexed by path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterTree {
    nodes: Vec<ClusterNode>,
    by_path: BTreeMap<String, NodeId>,
}

impl ClusterTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Level-1 node under an explicit path
    pub fn add_root(&mut self, path: impl Into<String>, kind: NodeKind, mut members: Vec<usize>) -> NodeId {
        members.sort_unstable();
        self.insert(ClusterNode {
            path: path.into(),
            level: 1,
            kind,
            parent: None,
            children: Vec::new(),
            members,
            label: Vec::new(),
            term_loadings: None,
            selected_k: None,
            quality: None,
        })
    }

    /// Add the next child of `parent`; its path extends the parent's
    pub fn add_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        mut members: Vec<usize>,
        term_loadings: Option<Vec<(usize, f64)>>,
    ) -> NodeId {
        members.sort_unstable();
        let (path, level) = {
            let p = &self.nodes[parent];
            (format!("{}.{}", p.path, p.children.len() + 1), p.level + 1)
        };
        let id = self.insert(ClusterNode {
            path,
            level,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            members,
            label: Vec::new(),
            term_loadings,
            selected_k: None,
            quality: None,
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn insert(&mut self, node: ClusterNode) -> NodeId {
        let id = self.nodes.len();
        self.by_path.insert(node.path.clone(), id);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &ClusterNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ClusterNode {
        &mut self.nodes[id]
    }

    /// Look a node up by path
    pub fn get(&self, path: &str) -> Option<&ClusterNode> {
        self.by_path.get(path).map(|&id| &self.nodes[id])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.iter()
    }

    /// Ids of all nodes at `level`, in insertion order
    pub fn level_ids(&self, level: u8) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.level == level)
            .map(|(id, _)| id)
            .collect()
    }

    /// Path of a node's parent
    pub fn parent_path(&self, id: NodeId) -> Option<&str> {
        self.nodes[id].parent.map(|p| self.nodes[p].path.as_str())
    }

    /// For every document row, the node holding it at each level.
    ///
    /// Entry `[row][level - 1]`.
    pub fn memberships(&self, n_docs: usize) -> Vec<[Option<NodeId>; 3]> {
        let mut out = vec![[None; 3]; n_docs];
        for (id, node) in self.nodes.iter().enumerate() {
            let slot = (node.level as usize).saturating_sub(1).min(2);
            for &row in &node.members {
                if row < n_docs {
                    out[row][slot] = Some(id);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_extend_parent() {
        let mut tree = ClusterTree::new();
        let root = tree.add_root("3", NodeKind::Cluster, vec![4, 1, 2]);
        let a = tree.add_child(root, NodeKind::Cluster, vec![1, 2], None);
        let b = tree.add_child(root, NodeKind::Cluster, vec![4], None);
        let leaf = tree.add_child(a, NodeKind::Passthrough, vec![1, 2], None);

        assert_eq!(tree.node(a).path, "3.1");
        assert_eq!(tree.node(b).path, "3.2");
        assert_eq!(tree.node(leaf).path, "3.1.1");
        assert_eq!(tree.node(leaf).level, 3);
        assert_eq!(tree.node(b).index(), 2);
        assert_eq!(tree.get("3.1.1").map(|n| n.size()), Some(2));
        assert_eq!(tree.parent_path(leaf), Some("3.1"));
        assert_eq!(tree.node(root).members, vec![1, 2, 4]);
    }

    #[test]
    fn test_memberships_per_level() {
        let mut tree = ClusterTree::new();
        let root = tree.add_root("1", NodeKind::Cluster, vec![0, 1]);
        let child = tree.add_child(root, NodeKind::Cluster, vec![0, 1], None);
        let leaf = tree.add_child(child, NodeKind::Cluster, vec![1], None);

        let m = tree.memberships(3);
        assert_eq!(m[1], [Some(root), Some(child), Some(leaf)]);
        assert_eq!(m[0], [Some(root), Some(child), None]);
        assert_eq!(m[2], [None, None, None]);
        assert_eq!(tree.level_ids(2), vec![child]);
    }
}
