//! Hybrid feature fusion
//!
//! Combines the latent text space and the coupling space into one vector
//! per document:
//! - text rows are rescaled to unit length; the coupling block is scaled
//!   as a whole so its longest row has unit length, keeping the relative
//!   strength of each document's coupling
//! - blocks are weighted and concatenated, never averaged
//! - a block with zero weight or no signal is left out entirely

use crate::coupling::CouplingNetwork;
use crate::svd::{truncated_svd, SvdConfig};
use crate::text::TextFeatures;
use ndarray::{s, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use streamforge_common::config::{CouplingConfig, FusionConfig, TextConfig};
use tracing::{info, warn};

const ZERO_NORM: f64 = 1e-12;

/// Coupling rows shorter than this fraction of the longest row are zeroed
const RELATIVE_FLOOR: f64 = 1e-3;

/// Which signals ended up in the fused space
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    /// Text and coupling blocks
    Hybrid,
    /// Text block only (no coupling data or zero coupling weight)
    TextOnly,
    /// Coupling block only (zero text weight)
    CouplingOnly,
}

/// Fused per-document vectors
#[derive(Debug, Clone)]
pub struct FusedFeatures {
    /// Documents x (text columns + coupling columns)
    pub vectors: Array2<f64>,
    pub text_columns: usize,
    pub coupling_columns: usize,
    pub mode: FusionMode,
}

impl FusedFeatures {
    /// Whether document `row` carries no signal at all
    pub fn is_empty_row(&self, row: usize) -> bool {
        self.vectors.row(row).iter().all(|v| v.abs() <= ZERO_NORM)
    }
}

/// Weighted concatenation of text and coupling features
#[derive(Debug, Clone)]
pub struct HybridFuser {
    pub text_weight: f64,
    pub coupling_weight: f64,
    /// Columns of the coupling summary block
    pub coupling_dimensions: usize,
    pub svd_oversampling: usize,
    pub svd_power_iterations: usize,
    pub seed: u64,
}

impl HybridFuser {
    /// Create a fuser from configuration
    pub fn from_config(fusion: &FusionConfig, coupling: &CouplingConfig, text: &TextConfig, seed: u64) -> Self {
        Self {
            text_weight: fusion.text_weight,
            coupling_weight: fusion.coupling_weight,
            coupling_dimensions: coupling.dimensions,
            svd_oversampling: text.svd_oversampling,
            svd_power_iterations: text.svd_power_iterations,
            seed,
        }
    }

    /// Dense low-dimensional summary of each document's coupling row.
    ///
    /// Each coupled document is given its strongest weight as self-coupling
    /// before the reduction, so partners point the same way.
    pub fn coupling_summary(&self, network: &CouplingNetwork) -> Array2<f64> {
        let svd = truncated_svd(
            &self_coupled(&network.matrix),
            &SvdConfig {
                rank: self.coupling_dimensions,
                oversampling: self.svd_oversampling,
                power_iterations: self.svd_power_iterations,
                seed: self.seed.wrapping_add(1),
            },
        );
        svd.coordinates
    }

    /// Fuse text vectors and coupling network into one space.
    ///
    /// Deterministic for the same inputs, weights and seed.
    pub fn fuse(&self, text: &TextFeatures, network: &CouplingNetwork) -> FusedFeatures {
        let n = text.vectors.nrows();

        let use_text = self.text_weight > 0.0 && text.dimensions() > 0;
        let use_coupling = self.coupling_weight > 0.0 && !network.is_empty();

        if self.coupling_weight > 0.0 && network.is_empty() {
            warn!("Coupling weight is set but the network has no edges; fusing text only");
        }

        let text_block = if use_text {
            Some(weighted_unit_rows(text.vectors.view(), self.text_weight))
        } else {
            None
        };
        let coupling_block = if use_coupling {
            let summary = self.coupling_summary(network);
            Some(weighted_block(summary.view(), self.coupling_weight))
        } else {
            None
        };

        let text_columns = text_block.as_ref().map(|b| b.ncols()).unwrap_or(0);
        let coupling_columns = coupling_block.as_ref().map(|b| b.ncols()).unwrap_or(0);

        let mut vectors = Array2::zeros((n, text_columns + coupling_columns));
        if let Some(block) = &text_block {
            vectors.slice_mut(s![.., ..text_columns]).assign(block);
        }
        if let Some(block) = &coupling_block {
            vectors.slice_mut(s![.., text_columns..]).assign(block);
        }

        let mode = match (text_columns > 0, coupling_columns > 0) {
            (true, true) => FusionMode::Hybrid,
            (false, true) => FusionMode::CouplingOnly,
            _ => FusionMode::TextOnly,
        };

        info!(
            mode = ?mode,
            text_columns,
            coupling_columns,
            text_weight = self.text_weight,
            coupling_weight = self.coupling_weight,
            "Features fused"
        );

        FusedFeatures {
            vectors,
            text_columns,
            coupling_columns,
            mode,
        }
    }
}

/// Scale every row to unit length, then by `weight`; zero rows stay zero
fn weighted_unit_rows(block: ArrayView2<f64>, weight: f64) -> Array2<f64> {
    let mut out = block.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > ZERO_NORM {
            row *= weight / norm;
        } else {
            row.fill(0.0);
        }
    }
    out
}

/// Scale the whole block so its longest row has length `weight`. Rows
/// shorter than `RELATIVE_FLOOR` of the longest carry no usable direction
/// and are zeroed.
fn weighted_block(block: ArrayView2<f64>, weight: f64) -> Array2<f64> {
    let norms: Vec<f64> = block.axis_iter(Axis(0)).map(|row| row.dot(&row).sqrt()).collect();
    let longest = norms.iter().copied().fold(0.0, f64::max);

    let mut out = block.to_owned();
    if longest <= ZERO_NORM {
        out.fill(0.0);
        return out;
    }

    let floor = longest * RELATIVE_FLOOR;
    for (mut row, &norm) in out.axis_iter_mut(Axis(0)).zip(norms.iter()) {
        if norm < floor {
            row.fill(0.0);
        } else {
            row *= weight / longest;
        }
    }
    out
}

/// Copy of `matrix` with each non-empty row's largest weight on the diagonal
fn self_coupled(matrix: &CsMat<f64>) -> CsMat<f64> {
    let mut tri = TriMat::with_capacity((matrix.rows(), matrix.cols()), matrix.nnz() + matrix.rows());
    for (row, vec) in matrix.outer_iterator().enumerate() {
        let strongest = vec.iter().map(|(_, &w)| w).fold(0.0, f64::max);
        if strongest > 0.0 {
            tri.add_triplet(row, row, strongest);
        }
        for (col, &w) in vec.iter() {
            tri.add_triplet(row, col, w);
        }
    }
    tri.to_csr()
}
