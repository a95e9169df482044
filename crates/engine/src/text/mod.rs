//! Text feature builder
//!
//! Turns each document's title and abstract into a dense latent-semantic
//! vector: TF-IDF weighting over a frequency-filtered vocabulary, then a
//! truncated SVD to a fixed dimensionality.

mod tokenizer;
mod vectorizer;

pub use tokenizer::Tokenizer;
pub use vectorizer::{build_term_matrix, FrequencyBand, TermMatrix};

use crate::svd::{truncated_svd, SvdConfig};
use ndarray::Array2;
use streamforge_common::config::TextConfig;
use streamforge_common::errors::{EngineError, Result};
use streamforge_common::Document;
use tracing::{info, warn};

/// Output of the text feature stage
#[derive(Debug, Clone)]
pub struct TextFeatures {
    /// Term-weighted matrix, reused by Level-2/3 factorization and labels
    pub terms: TermMatrix,
    /// Latent vectors, documents x latent dimensions
    pub vectors: Array2<f64>,
    /// Fraction of term-matrix energy captured by the latent space
    pub explained_variance: f64,
}

impl TextFeatures {
    pub fn dimensions(&self) -> usize {
        self.vectors.ncols()
    }

    /// Whether document `row` produced a usable text vector
    pub fn has_text(&self, row: usize) -> bool {
        self.terms.has_terms(row)
    }
}

/// Build TF-IDF and latent vectors for the whole corpus.
///
/// Fails with a data error when fewer than two terms survive the
/// document-frequency filters.
pub fn build_text_features(documents: &[Document], config: &TextConfig, seed: u64) -> Result<TextFeatures> {
    if documents.is_empty() {
        return Err(EngineError::EmptyCorpus);
    }

    let tokenizer = Tokenizer::new(config.min_token_length)?;
    let band = FrequencyBand {
        min_count: config.min_document_count,
        min_fraction: config.min_document_fraction,
        max_fraction: config.max_document_fraction,
    };

    let texts: Vec<String> = documents.iter().map(Document::text_payload).collect();
    let terms = build_term_matrix(&texts, &tokenizer, &band);

    if terms.n_terms() < 2 {
        return Err(EngineError::EmptyVocabulary {
            surviving: terms.n_terms(),
        });
    }

    let empty = (0..terms.n_docs()).filter(|&r| !terms.has_terms(r)).count();
    if empty > 0 {
        warn!(
            documents_without_terms = empty,
            "Documents with no in-vocabulary terms get a zero text vector"
        );
    }

    let svd = truncated_svd(
        &terms.matrix,
        &SvdConfig {
            rank: config.latent_dimensions,
            oversampling: config.svd_oversampling,
            power_iterations: config.svd_power_iterations,
            seed,
        },
    );

    info!(
        documents = terms.n_docs(),
        vocabulary = terms.n_terms(),
        dimensions = svd.rank(),
        explained_variance = svd.explained_variance,
        "Text features built"
    );

    Ok(TextFeatures {
        terms,
        vectors: svd.coordinates,
        explained_variance: svd.explained_variance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("a", "Citation coupling networks", "bibliographic coupling of citation graphs"),
            Document::new("b", "Coupling networks at scale", "inverted index for citation coupling"),
            Document::new("c", "Topic models", "latent topics in document collections"),
            Document::new("d", "Latent topic models", "topics for large document corpora"),
        ]
    }

    fn config() -> TextConfig {
        TextConfig {
            min_document_count: 2,
            min_document_fraction: 0.0,
            max_document_fraction: 0.8,
            latent_dimensions: 3,
            ..TextConfig::default()
        }
    }

    #[test]
    fn test_vectors_have_target_dimensions() {
        let features = build_text_features(&corpus(), &config(), 1).unwrap();
        assert_eq!(features.vectors.dim(), (4, 3));
        assert!(features.explained_variance > 0.0);
        assert!(features.explained_variance <= 1.0 + 1e-9);
    }

    #[test]
    fn test_similar_documents_are_close() {
        let features = build_text_features(&corpus(), &config(), 1).unwrap();
        let v = &features.vectors;
        let dist = |i: usize, j: usize| -> f64 {
            v.row(i).iter().zip(v.row(j).iter()).map(|(a, b)| (a - b).powi(2)).sum()
        };
        assert!(dist(0, 1) < dist(0, 2));
        assert!(dist(2, 3) < dist(1, 3));
    }

    #[test]
    fn test_no_vocabulary_is_data_error() {
        let docs = vec![
            Document::new("a", "alpha", ""),
            Document::new("b", "beta", ""),
        ];
        let err = build_text_features(&docs, &config(), 1).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_empty_corpus_is_data_error() {
        let err = build_text_features(&[], &config(), 1).unwrap_err();
        assert!(matches!(err, EngineError::EmptyCorpus));
    }

    #[test]
    fn test_empty_text_yields_zero_vector() {
        let mut docs = corpus();
        docs.push(Document::new("e", "", ""));
        let features = build_text_features(&docs, &config(), 1).unwrap();
        assert!(!features.has_text(4));
        assert!(features.vectors.row(4).iter().all(|x| x.abs() < 1e-12));
    }
}
