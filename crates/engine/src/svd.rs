//! Truncated SVD for sparse matrices
//!
//! Randomized subspace iteration on a CSR matrix followed by a Jacobi
//! eigen-solve of the small projected Gram matrix. Needs no LAPACK and is
//! fully determined by the seed.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

const EPS: f64 = 1e-12;
const JACOBI_MAX_SWEEPS: usize = 100;

/// Truncated SVD parameters
#[derive(Debug, Clone)]
pub struct SvdConfig {
    /// Target rank
    pub rank: usize,
    /// Extra random directions beyond the target rank
    pub oversampling: usize,
    /// Subspace power iterations
    pub power_iterations: usize,
    /// Seed for the random test matrix
    pub seed: u64,
}

/// Result of a truncated SVD
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// Row coordinates in the latent space (U * S), rows x rank
    pub coordinates: Array2<f64>,
    /// Singular values, descending
    pub singular_values: Vec<f64>,
    /// Fraction of the squared Frobenius norm captured by the kept components
    pub explained_variance: f64,
}

impl TruncatedSvd {
    /// Number of components kept
    pub fn rank(&self) -> usize {
        self.singular_values.len()
    }
}

/// Compute a rank-limited SVD of `matrix`.
///
/// The kept rank never exceeds the smaller matrix dimension.
pub fn truncated_svd(matrix: &CsMat<f64>, config: &SvdConfig) -> TruncatedSvd {
    let (rows, cols) = (matrix.rows(), matrix.cols());
    let rank = config.rank.min(rows).min(cols);
    let total_energy: f64 = matrix.data().iter().map(|v| v * v).sum();

    if rank == 0 || total_energy <= EPS {
        return TruncatedSvd {
            coordinates: Array2::zeros((rows, rank)),
            singular_values: vec![0.0; rank],
            explained_variance: 0.0,
        };
    }

    let width = (rank + config.oversampling).min(rows).min(cols);
    let transposed = transpose(matrix);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let omega = Array2::from_shape_fn((cols, width), |_| rng.gen_range(-1.0..1.0));

    let mut q = orthonormalize_columns(sparse_dense_product(matrix, &omega));
    for _ in 0..config.power_iterations {
        let z = orthonormalize_columns(sparse_dense_product(&transposed, &q));
        q = orthonormalize_columns(sparse_dense_product(matrix, &z));
    }

    // B = Q^T A, held transposed as A^T Q (cols x width)
    let bt = sparse_dense_product(&transposed, &q);
    let gram = bt.t().dot(&bt);
    let (eigenvalues, eigenvectors) = jacobi_eigen(gram);

    let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[b]
            .partial_cmp(&eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(rank);

    let singular_values: Vec<f64> = order
        .iter()
        .map(|&i| eigenvalues[i].max(0.0).sqrt())
        .collect();

    // U * S = Q * V_G * S
    let mut basis = Array2::zeros((width, rank));
    for (out, &i) in order.iter().enumerate() {
        basis
            .column_mut(out)
            .assign(&(&eigenvectors.column(i) * singular_values[out]));
    }
    let coordinates = q.dot(&basis);

    let captured: f64 = singular_values.iter().map(|s| s * s).sum();

    TruncatedSvd {
        coordinates,
        singular_values,
        explained_variance: (captured / total_energy).min(1.0),
    }
}

/// Transpose a CSR matrix into a new CSR matrix
pub fn transpose(matrix: &CsMat<f64>) -> CsMat<f64> {
    let mut tri = TriMat::with_capacity((matrix.cols(), matrix.rows()), matrix.nnz());
    for (row, vec) in matrix.outer_iterator().enumerate() {
        for (col, &value) in vec.iter() {
            tri.add_triplet(col, row, value);
        }
    }
    tri.to_csr()
}

/// Sparse (CSR) times dense, parallel over output rows
pub fn sparse_dense_product(sparse: &CsMat<f64>, dense: &Array2<f64>) -> Array2<f64> {
    let width = dense.ncols();
    let rows: Vec<Vec<f64>> = (0..sparse.rows())
        .into_par_iter()
        .map(|i| {
            let mut out = Array1::zeros(width);
            if let Some(row) = sparse.outer_view(i) {
                for (j, &value) in row.iter() {
                    out.scaled_add(value, &dense.row(j));
                }
            }
            out.to_vec()
        })
        .collect();

    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((sparse.rows(), width), flat)
        .unwrap_or_else(|_| Array2::zeros((sparse.rows(), width)))
}

/// Modified Gram-Schmidt with one re-orthogonalization pass.
///
/// Columns that collapse to zero stay zero.
fn orthonormalize_columns(matrix: Array2<f64>) -> Array2<f64> {
    let mut columns: Vec<Array1<f64>> = matrix.axis_iter(Axis(1)).map(|c| c.to_owned()).collect();

    for j in 0..columns.len() {
        for _ in 0..2 {
            for p in 0..j {
                let projection = columns[j].dot(&columns[p]);
                let basis = columns[p].clone();
                columns[j].scaled_add(-projection, &basis);
            }
        }
        let norm = columns[j].dot(&columns[j]).sqrt();
        if norm > EPS {
            columns[j] /= norm;
        } else {
            columns[j].fill(0.0);
        }
    }

    let mut out = Array2::zeros(matrix.raw_dim());
    for (j, column) in columns.iter().enumerate() {
        out.column_mut(j).assign(column);
    }
    out
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
///
/// Returns eigenvalues and eigenvectors (as columns), unsorted.
fn jacobi_eigen(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();
        let scale: f64 = a.iter().map(|x| x * x).sum::<f64>().max(EPS);
        if off_diagonal <= 1e-22 * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() <= EPS * 1e-6 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[[i, i]]).collect();
    (eigenvalues, v)
}
