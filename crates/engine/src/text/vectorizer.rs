//! TF-IDF vectorization into a sparse document-term matrix

use super::tokenizer::Tokenizer;
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Document-frequency band a term must fall in to enter the vocabulary
#[derive(Debug, Clone)]
pub struct FrequencyBand {
    pub min_count: usize,
    pub min_fraction: f64,
    pub max_fraction: f64,
}

impl FrequencyBand {
    /// Inclusive document-count bounds for a corpus of `n_docs`
    fn bounds(&self, n_docs: usize) -> (usize, usize) {
        let n = n_docs as f64;
        let low = self
            .min_count
            .max((self.min_fraction * n).ceil() as usize)
            .max(1);
        let high = ((self.max_fraction * n).floor() as usize).max(1);
        (low, high)
    }
}

/// TF-IDF matrix with its vocabulary
#[derive(Debug, Clone)]
pub struct TermMatrix {
    /// Documents x terms, L2-normalized rows (CSR)
    pub matrix: CsMat<f64>,
    /// Column index -> term, sorted for deterministic order
    pub vocabulary: Vec<String>,
    /// Smooth IDF per column
    pub idf: Vec<f64>,
    /// Documents containing each column's term
    pub doc_freq: Vec<usize>,
}

impl TermMatrix {
    pub fn n_docs(&self) -> usize {
        self.matrix.rows()
    }

    pub fn n_terms(&self) -> usize {
        self.vocabulary.len()
    }

    /// Whether document `row` has any in-vocabulary term
    pub fn has_terms(&self, row: usize) -> bool {
        self.matrix.outer_view(row).map(|r| r.nnz() > 0).unwrap_or(false)
    }

    /// Restrict to a subset of rows, keeping only columns those rows use.
    ///
    /// Returns the sub-matrix and the original column index of each kept column.
    pub fn submatrix(&self, rows: &[usize]) -> (CsMat<f64>, Vec<usize>) {
        let mut used: Vec<usize> = rows
            .iter()
            .filter_map(|&r| self.matrix.outer_view(r))
            .flat_map(|view| view.indices().to_vec())
            .collect();
        used.sort_unstable();
        used.dedup();

        let remap: HashMap<usize, usize> = used.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let mut tri = TriMat::new((rows.len(), used.len()));
        for (local, &r) in rows.iter().enumerate() {
            if let Some(view) = self.matrix.outer_view(r) {
                for (col, &value) in view.iter() {
                    tri.add_triplet(local, remap[&col], value);
                }
            }
        }
        (tri.to_csr(), used)
    }
}

/// Build the TF-IDF matrix for a corpus of text payloads.
///
/// * tf: raw in-document count
/// * idf: `ln((1 + n) / (1 + df)) + 1`
/// * rows L2-normalized; documents without vocabulary terms stay empty
pub fn build_term_matrix(texts: &[String], tokenizer: &Tokenizer, band: &FrequencyBand) -> TermMatrix {
    let n_docs = texts.len();

    let tokenized: Vec<Vec<String>> = texts.par_iter().map(|t| tokenizer.tokenize(t)).collect();

    // Document frequency in a BTreeMap so the vocabulary order is fixed
    let mut df: BTreeMap<&str, usize> = BTreeMap::new();
    for tokens in &tokenized {
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for term in unique {
            *df.entry(term).or_insert(0) += 1;
        }
    }

    let (low, high) = band.bounds(n_docs);
    let vocabulary: Vec<String> = df
        .iter()
        .filter(|(_, &count)| count >= low && count <= high)
        .map(|(term, _)| term.to_string())
        .collect();

    debug!(
        raw_terms = df.len(),
        kept_terms = vocabulary.len(),
        min_df = low,
        max_df = high,
        "Vocabulary filtered"
    );

    let vocab_index: HashMap<&str, usize> = vocabulary
        .iter()
        .enumerate()
        .map(|(i, term)| (term.as_str(), i))
        .collect();

    let doc_freq: Vec<usize> = vocabulary.iter().map(|t| df[t.as_str()]).collect();
    let idf: Vec<f64> = doc_freq
        .iter()
        .map(|&d| ((1.0 + n_docs as f64) / (1.0 + d as f64)).ln() + 1.0)
        .collect();

    let rows: Vec<Vec<(usize, f64)>> = tokenized
        .par_iter()
        .map(|tokens| {
            let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
            for token in tokens {
                if let Some(&col) = vocab_index.get(token.as_str()) {
                    *counts.entry(col).or_insert(0) += 1;
                }
            }
            let mut row: Vec<(usize, f64)> = counts
                .into_iter()
                .map(|(col, count)| (col, count as f64 * idf[col]))
                .collect();
            let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, v) in row.iter_mut() {
                    *v /= norm;
                }
            }
            row
        })
        .collect();

    let mut tri = TriMat::new((n_docs, vocabulary.len()));
    for (doc, row) in rows.into_iter().enumerate() {
        for (col, value) in row {
            tri.add_triplet(doc, col, value);
        }
    }

    TermMatrix {
        matrix: tri.to_csr(),
        vocabulary,
        idf,
        doc_freq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(min_count: usize, max_fraction: f64) -> FrequencyBand {
        FrequencyBand {
            min_count,
            min_fraction: 0.0,
            max_fraction,
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_frequency_band_filters_terms() {
        let tokenizer = Tokenizer::new(3).unwrap();
        let corpus = texts(&[
            "graph coupling network everywhere",
            "graph coupling citation everywhere",
            "topic model citation everywhere",
            "topic model rare everywhere",
        ]);
        let tm = build_term_matrix(&corpus, &tokenizer, &band(2, 0.8));

        // "everywhere" is in 100% of documents, "network"/"rare" in one
        assert_eq!(tm.vocabulary, vec!["citation", "coupling", "graph", "model", "topic"]);
        assert_eq!(tm.doc_freq, vec![2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_rows_are_unit_norm() {
        let tokenizer = Tokenizer::new(3).unwrap();
        let corpus = texts(&["alpha beta beta", "alpha gamma", "beta gamma", ""]);
        let tm = build_term_matrix(&corpus, &tokenizer, &band(1, 1.0));

        for row in 0..3 {
            let view = tm.matrix.outer_view(row).unwrap();
            let norm: f64 = view.data().iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
        }
        assert!(!tm.has_terms(3));
    }

    #[test]
    fn test_submatrix_keeps_used_columns() {
        let tokenizer = Tokenizer::new(3).unwrap();
        let corpus = texts(&["alpha beta", "gamma delta", "alpha gamma"]);
        let tm = build_term_matrix(&corpus, &tokenizer, &band(1, 1.0));

        let (sub, columns) = tm.submatrix(&[0, 2]);
        assert_eq!(sub.rows(), 2);
        let names: Vec<&str> = columns.iter().map(|&c| tm.vocabulary[c].as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }
}
