//! Non-negative matrix factorization by multiplicative updates
//!
//! Factorizes a node's member x term TF-IDF block `V ~ W H` with `W`
//! (members x k) and `H` (k x terms) kept non-negative. Each member's
//! dominant topic is the column of `W` with the largest weight; a member
//! whose `W` row is all zero has none.

use crate::svd::{sparse_dense_product, transpose};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sprs::CsMat;

const EPSILON: f64 = 1e-10;

/// Check convergence every this many iterations
const CHECK_INTERVAL: usize = 10;

#[derive(Debug, Clone)]
pub struct NmfConfig {
    pub max_iterations: usize,
    /// Stop when the relative error improves by less than this
    pub tolerance: f64,
    pub seed: u64,
}

/// Result of one factorization
#[derive(Debug, Clone)]
pub struct Factorization {
    /// Members x k
    pub w: Array2<f64>,
    /// k x terms
    pub h: Array2<f64>,
    /// `||V - WH||_F / ||V||_F`, 0 for an all-zero input
    pub relative_error: f64,
    pub iterations: usize,
}

impl Factorization {
    pub fn k(&self) -> usize {
        self.h.nrows()
    }

    /// Dominant topic per member; ties go to the lowest topic index.
    ///
    /// `None` for members with no weight on any topic, e.g. rows of `V`
    /// without terms.
    pub fn dominant_topics(&self) -> Vec<Option<usize>> {
        self.w
            .axis_iter(Axis(0))
            .map(|row| {
                let mut best = 0;
                for (topic, &value) in row.iter().enumerate() {
                    if value > row[best] {
                        best = topic;
                    }
                }
                (row.get(best).copied().unwrap_or(0.0) > EPSILON).then_some(best)
            })
            .collect()
    }

    /// Loadings of `topic` as (column, weight), strongest first, zeros dropped
    pub fn topic_terms(&self, topic: usize) -> Vec<(usize, f64)> {
        let mut terms: Vec<(usize, f64)> = self
            .h
            .row(topic)
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, w)| w > EPSILON)
            .collect();
        terms.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        terms
    }
}

/// Factorize `matrix` into `k` non-negative topics.
///
/// `V` stays sparse; only the factors are dense. Deterministic for a
/// fixed seed.
pub fn factorize(matrix: &CsMat<f64>, k: usize, config: &NmfConfig) -> Factorization {
    let (m, t) = (matrix.rows(), matrix.cols());
    let k = k.max(1);

    let v_sq: f64 = matrix.data().iter().map(|x| x * x).sum();
    if v_sq <= EPSILON || m == 0 || t == 0 {
        return Factorization {
            w: Array2::zeros((m, k)),
            h: Array2::zeros((k, t)),
            relative_error: 0.0,
            iterations: 0,
        };
    }
    let v_t = transpose(matrix);

    // Random init scaled to the data's mean magnitude
    let mean = matrix.data().iter().sum::<f64>() / (m * t) as f64;
    let scale = (mean / k as f64).sqrt();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut w = Array2::from_shape_simple_fn((m, k), || rng.gen::<f64>() * scale + EPSILON);
    let mut h = Array2::from_shape_simple_fn((k, t), || rng.gen::<f64>() * scale + EPSILON);

    let mut previous = relative_error(matrix, &w, &h, v_sq);
    let mut iterations = 0;

    while iterations < config.max_iterations {
        // H <- H * (W'V) / (W'WH)
        let numerator = sparse_dense_product(&v_t, &w).reversed_axes();
        let denominator = w.t().dot(&w).dot(&h);
        h.zip_mut_with(&numerator, |x, &n| *x *= n);
        h.zip_mut_with(&denominator, |x, &d| *x /= d + EPSILON);

        // W <- W * (VH') / (WHH')
        let numerator = sparse_dense_product(matrix, &h.t().to_owned());
        let denominator = w.dot(&h.dot(&h.t()));
        w.zip_mut_with(&numerator, |x, &n| *x *= n);
        w.zip_mut_with(&denominator, |x, &d| *x /= d + EPSILON);

        iterations += 1;

        if iterations % CHECK_INTERVAL == 0 {
            let error = relative_error(matrix, &w, &h, v_sq);
            let converged = (previous - error).abs() < config.tolerance;
            previous = error;
            if converged {
                break;
            }
        }
    }

    let relative_error = if iterations % CHECK_INTERVAL == 0 {
        previous
    } else {
        relative_error(matrix, &w, &h, v_sq)
    };

    Factorization {
        w,
        h,
        relative_error,
        iterations,
    }
}

/// `||V - WH||_F / ||V||_F` without materializing `WH`:
/// `||V||^2 - 2 <W, VH'> + <W'W, HH'>`
fn relative_error(v: &CsMat<f64>, w: &Array2<f64>, h: &Array2<f64>, v_sq: f64) -> f64 {
    let vh = sparse_dense_product(v, &h.t().to_owned());
    let cross: f64 = (w * &vh).sum();
    let gram: f64 = (&w.t().dot(w) * &h.dot(&h.t())).sum();
    ((v_sq - 2.0 * cross + gram).max(0.0) / v_sq).sqrt()
}
