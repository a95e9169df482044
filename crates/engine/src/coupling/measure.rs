//! Normalization policies for shared-reference counts

use streamforge_common::CouplingMeasure;

/// Turns a pair's shared-reference count into a coupling weight.
///
/// Implementations must be symmetric in `refs_a`/`refs_b` and return 0 when
/// `shared` is 0.
pub trait CouplingNormalizer: Send + Sync {
    fn normalize(&self, shared: u32, refs_a: usize, refs_b: usize) -> f64;

    fn name(&self) -> &'static str;
}

impl CouplingNormalizer for CouplingMeasure {
    fn normalize(&self, shared: u32, refs_a: usize, refs_b: usize) -> f64 {
        if shared == 0 {
            return 0.0;
        }
        let shared = shared as f64;
        match self {
            CouplingMeasure::SharedCount => shared,
            CouplingMeasure::Jaccard => {
                let union = refs_a as f64 + refs_b as f64 - shared;
                if union > 0.0 { shared / union } else { 0.0 }
            }
            CouplingMeasure::Cosine => {
                let denom = (refs_a as f64 * refs_b as f64).sqrt();
                if denom > 0.0 { shared / denom } else { 0.0 }
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CouplingMeasure::SharedCount => "shared_count",
            CouplingMeasure::Jaccard => "jaccard",
            CouplingMeasure::Cosine => "cosine",
        }
    }
}
