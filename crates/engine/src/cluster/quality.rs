//! Cluster quality scoring and model selection

use ndarray::ArrayView2;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Upper-triangle Euclidean distances, row-major, length n*(n-1)/2
#[derive(Debug, Clone)]
pub struct CondensedDistances {
    n: usize,
    data: Vec<f64>,
}

impl CondensedDistances {
    /// Pairwise Euclidean distances between the rows of `points`
    pub fn from_points(points: ArrayView2<f64>) -> Self {
        let n = points.nrows();
        let rows: Vec<Vec<f64>> = (0..n.saturating_sub(1))
            .into_par_iter()
            .map(|i| {
                let a = points.row(i);
                ((i + 1)..n)
                    .map(|j| {
                        a.iter()
                            .zip(points.row(j).iter())
                            .map(|(x, y)| (x - y) * (x - y))
                            .sum::<f64>()
                            .sqrt()
                    })
                    .collect()
            })
            .collect();

        Self {
            n,
            data: rows.into_iter().flatten().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Distance between points `i` and `j`
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        // Offset of row i in the condensed layout
        let offset = i * self.n - i * (i + 1) / 2;
        self.data[offset + (j - i - 1)]
    }

    /// Copy of the raw condensed buffer (kodama consumes it mutably)
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }
}

/// Mean silhouette width of a partition.
///
/// Points in singleton clusters score 0. A partition with fewer than two
/// clusters scores 0.
pub fn mean_silhouette(distances: &CondensedDistances, labels: &[usize]) -> f64 {
    let n = labels.len();
    let k = labels.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    if n < 2 || k < 2 {
        return 0.0;
    }

    let mut sizes = vec![0usize; k];
    for &l in labels {
        sizes[l] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return 0.0;
    }

    // Summed sequentially in point order
    let widths: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = labels[i];
            if sizes[own] <= 1 {
                return 0.0;
            }
            let mut sums = vec![0.0f64; k];
            for j in 0..n {
                if j != i {
                    sums[labels[j]] += distances.get(i, j);
                }
            }
            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..k)
                .filter(|&c| c != own && sizes[c] > 0)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);
            let max_ab = a.max(b);
            if max_ab < f64::EPSILON || !b.is_finite() {
                0.0
            } else {
                (b - a) / max_ab
            }
        })
        .collect();

    widths.iter().sum::<f64>() / n as f64
}

/// Level-appropriate quality metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityMetric {
    /// Mean silhouette width, higher is better
    Silhouette,
    /// Relative reconstruction error plus `penalty * k`, lower is better
    PenalizedReconstruction { penalty: f64 },
}

impl QualityMetric {
    /// Penalized score for a factorization with relative error `error`
    pub fn penalize(&self, error: f64, k: usize) -> f64 {
        match self {
            QualityMetric::Silhouette => error,
            QualityMetric::PenalizedReconstruction { penalty } => error + penalty * k as f64,
        }
    }

    /// Ordering where `Less` means `a` is the better score
    fn compare(&self, a: f64, b: f64) -> Ordering {
        // NaN always loses
        match (a.is_nan(), b.is_nan()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        match self {
            QualityMetric::Silhouette => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
            QualityMetric::PenalizedReconstruction { .. } => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        }
    }
}

/// A candidate partition with its score and whatever produced it
#[derive(Debug, Clone)]
pub struct Evaluated<P> {
    pub k: usize,
    pub score: f64,
    /// Cluster index per member, 0-based
    pub assignments: Vec<usize>,
    pub payload: P,
}

/// Pick the best candidate under `metric`; ties go to the smaller k.
///
/// Returns `None` only for an empty candidate list.
pub fn select_best<P>(metric: &QualityMetric, candidates: Vec<Evaluated<P>>) -> Option<Evaluated<P>> {
    candidates.into_iter().min_by(|a, b| {
        metric
            .compare(a.score, b.score)
            .then_with(|| a.k.cmp(&b.k))
    })
}
