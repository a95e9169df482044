//! Inverted reference index
//!
//! Maps each cited identifier to the corpus documents citing it. Coupling
//! pairs are enumerated per reference bucket, so work grows with the number
//! of (reference, citing document) associations instead of corpus size
//! squared.

use rayon::prelude::*;
use std::collections::HashMap;
use streamforge_common::Document;

/// Shared-reference counts keyed by document pair `(i, j)` with `i < j`
pub type PairCounts = HashMap<(u32, u32), u32>;

/// Reference -> citing documents
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    /// Cited identifier -> citing document rows, ascending
    citing: HashMap<String, Vec<u32>>,

    /// Distinct references per document row
    reference_counts: Vec<usize>,
}

impl ReferenceIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every document's distinct references
    pub fn from_documents(documents: &[Document]) -> Self {
        let mut index = Self::new();
        for doc in documents {
            index.add_document(&doc.reference_set());
        }
        index
    }

    /// Add the next document row with its distinct references
    pub fn add_document(&mut self, references: &[&str]) {
        let row = self.reference_counts.len() as u32;
        for &reference in references {
            self.citing.entry(reference.to_string()).or_default().push(row);
        }
        self.reference_counts.push(references.len());
    }

    /// Documents citing `reference`
    pub fn citing_documents(&self, reference: &str) -> &[u32] {
        self.citing.get(reference).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Distinct references of document `row`
    pub fn reference_count(&self, row: usize) -> usize {
        self.reference_counts.get(row).copied().unwrap_or(0)
    }

    /// Number of indexed documents
    pub fn document_count(&self) -> usize {
        self.reference_counts.len()
    }

    /// Number of distinct cited identifiers
    pub fn distinct_references(&self) -> usize {
        self.citing.len()
    }

    /// Total (reference, citing document) associations
    pub fn total_associations(&self) -> usize {
        self.reference_counts.iter().sum()
    }

    /// Documents citing at least one reference
    pub fn documents_with_references(&self) -> usize {
        self.reference_counts.iter().filter(|&&c| c > 0).count()
    }

    /// Accumulate shared-reference counts for every co-citing pair.
    ///
    /// Only buckets with two or more citing documents are visited. Each
    /// rayon task folds into its own map; maps are merged afterwards.
    /// Returns the counts and the number of pair visits performed.
    pub fn shared_counts(&self) -> (PairCounts, u64) {
        let buckets: Vec<&Vec<u32>> = self.citing.values().filter(|docs| docs.len() >= 2).collect();

        let visits: u64 = buckets
            .iter()
            .map(|docs| {
                let k = docs.len() as u64;
                k * (k - 1) / 2
            })
            .sum();

        let counts = buckets
            .par_iter()
            .fold(PairCounts::new, |mut acc, docs| {
                for (a, &i) in docs.iter().enumerate() {
                    for &j in &docs[a + 1..] {
                        *acc.entry((i, j)).or_insert(0) += 1;
                    }
                }
                acc
            })
            .reduce(PairCounts::new, |mut left, right| {
                if left.len() < right.len() {
                    return merge(right, left);
                }
                for (pair, count) in right {
                    *left.entry(pair).or_insert(0) += count;
                }
                left
            });

        (counts, visits)
    }
}

fn merge(mut into: PairCounts, from: PairCounts) -> PairCounts {
    for (pair, count) in from {
        *into.entry(pair).or_insert(0) += count;
    }
    into
}
