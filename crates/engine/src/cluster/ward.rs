//! Level-1 agglomerative clustering with Ward (minimum-variance) linkage
//!
//! The dendrogram is built once over all points and then cut at each
//! candidate k, so evaluating several candidates costs one linkage.

use super::quality::{mean_silhouette, CondensedDistances, Evaluated, QualityMetric};
use super::select_best;
use kodama::{linkage, Method};
use ndarray::ArrayView2;
use streamforge_common::errors::EngineError;
use tracing::{debug, info, warn};

/// Merge sequence from kodama.
///
/// Leaves are `0..n`; merge `i` creates cluster `n + i`.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    n_items: usize,
    merges: Vec<(usize, usize)>,
}

impl Dendrogram {
    /// Run Ward linkage over condensed Euclidean distances
    pub fn ward(distances: &CondensedDistances) -> Self {
        let n = distances.len();
        if n < 2 {
            return Self {
                n_items: n,
                merges: Vec::new(),
            };
        }

        let mut condensed = distances.to_vec();
        let dend = linkage(&mut condensed, n, Method::Ward);
        let merges = dend.steps().iter().map(|s| (s.cluster1, s.cluster2)).collect();

        Self { n_items: n, merges }
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Flat partition into `k` clusters (clamped to `1..=n`).
    ///
    /// Cluster labels are numbered by first appearance in item order.
    pub fn cut(&self, k: usize) -> Vec<usize> {
        let n = self.n_items;
        if n == 0 {
            return Vec::new();
        }
        let k = k.clamp(1, n);
        let n_merges = (n - k).min(self.merges.len());

        let mut parent: Vec<usize> = (0..n).collect();
        // Representative leaf for every cluster label created so far
        let mut representative: Vec<usize> = (0..n).collect();

        for &(a, b) in &self.merges[..n_merges] {
            let ra = find(&mut parent, representative[a]);
            let rb = find(&mut parent, representative[b]);
            let root = ra.min(rb);
            parent[ra.max(rb)] = root;
            representative.push(root);
        }

        let mut relabel = vec![usize::MAX; n];
        let mut next = 0;
        (0..n)
            .map(|leaf| {
                let root = find(&mut parent, leaf);
                if relabel[root] == usize::MAX {
                    relabel[root] = next;
                    next += 1;
                }
                relabel[root]
            })
            .collect()
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Level-1 partitioner: Ward linkage plus silhouette-based selection of k
#[derive(Debug, Clone)]
pub struct WardClustering {
    candidates: Vec<usize>,
}

impl WardClustering {
    pub fn new(candidates: &[usize]) -> Self {
        let mut candidates = candidates.to_vec();
        candidates.sort_unstable();
        candidates.dedup();
        Self { candidates }
    }

    /// Partition `points` and return the selected candidate.
    ///
    /// Candidates that cannot be evaluated on this many points are skipped.
    /// When none is usable every point lands in a single cluster. The second
    /// value is the number of skipped candidates.
    pub fn fit(&self, points: ArrayView2<f64>) -> (Evaluated<()>, usize) {
        let n = points.nrows();
        let distances = CondensedDistances::from_points(points);
        let dendrogram = Dendrogram::ward(&distances);

        let mut evaluated = Vec::new();
        let mut skipped = 0;

        for &k in &self.candidates {
            if k > n || k < 2 {
                let err = EngineError::DegenerateCluster {
                    path: "<root>".to_string(),
                    k,
                    members: n,
                };
                debug!(error = %err, "Skipping Level-1 candidate");
                skipped += 1;
                continue;
            }

            let assignments = dendrogram.cut(k);
            let score = mean_silhouette(&distances, &assignments);
            debug!(k, silhouette = score, "Level-1 candidate evaluated");

            evaluated.push(Evaluated {
                k,
                score,
                assignments,
                payload: (),
            });
        }

        let selected = match select_best(&QualityMetric::Silhouette, evaluated) {
            Some(best) => best,
            None => {
                warn!(
                    points = n,
                    candidates = ?self.candidates,
                    "No Level-1 candidate usable; keeping a single stream"
                );
                Evaluated {
                    k: 1,
                    score: 0.0,
                    assignments: vec![0; n],
                    payload: (),
                }
            }
        };

        info!(
            points = n,
            k = selected.k,
            silhouette = selected.score,
            skipped,
            "Level-1 partition selected"
        );

        (selected, skipped)
    }
}
