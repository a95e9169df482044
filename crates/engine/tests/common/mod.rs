//! Synthetic corpora shared by the integration tests

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use streamforge_common::{Document, EngineConfig};

const SHARED_WORDS: &[&str] = &[
    "network", "learning", "model", "analysis", "method", "framework", "evaluation", "dataset",
    "algorithm", "system", "performance", "structure", "inference", "measure", "signal", "pattern",
];

const SCIENTOMETRIC_WORDS: &[&str] = &[
    "citation", "bibliometric", "journal", "scholarly", "coauthorship", "impact", "altmetric",
    "publication", "indexing", "peer",
];

const GENOMIC_WORDS: &[&str] = &[
    "protein", "genome", "molecular", "sequencing", "enzyme", "transcription", "mutation",
    "phenotype", "expression", "cellular",
];

fn sentence(rng: &mut StdRng, shared: usize, themed: &[&str], specific: usize) -> String {
    let mut words: Vec<&str> = SHARED_WORDS.choose_multiple(rng, shared).copied().collect();
    words.extend(themed.choose_multiple(rng, specific).copied());
    words.shuffle(rng);
    words.join(" ")
}

/// Two engineered groups of `per_group` documents.
///
/// Text overlaps heavily (mostly shared vocabulary); references come from
/// disjoint pools, so coupling is dense within a group and absent across.
/// Rows `0..per_group` are group A, the rest group B.
pub fn two_group_corpus(per_group: usize, seed: u64) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(seed);
    let pool_a: Vec<String> = (0..16).map(|i| format!("ref-a-{}", i)).collect();
    let pool_b: Vec<String> = (0..16).map(|i| format!("ref-b-{}", i)).collect();

    let mut docs = Vec::with_capacity(per_group * 2);
    for (group, themed, pool) in [("a", SCIENTOMETRIC_WORDS, &pool_a), ("b", GENOMIC_WORDS, &pool_b)] {
        for i in 0..per_group {
            let title = sentence(&mut rng, 3, themed, 1);
            let abstract_text = sentence(&mut rng, 5, themed, 2);
            let refs: Vec<String> = pool.choose_multiple(&mut rng, 8).cloned().collect();
            docs.push(Document::new(format!("{}-{:03}", group, i), title, abstract_text).with_references(refs));
        }
    }
    docs
}

/// `n` documents each citing `per_doc` references from a pool of `pool`
pub fn citation_corpus(n: usize, per_doc: usize, pool: usize, seed: u64) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(seed);
    let ids: Vec<usize> = (0..pool).collect();
    (0..n)
        .map(|i| {
            let refs: Vec<String> = ids
                .choose_multiple(&mut rng, per_doc)
                .map(|r| format!("W{}", r))
                .collect();
            Document::new(format!("doc-{}", i), "", "").with_references(refs)
        })
        .collect()
}

/// Configuration sized for small synthetic corpora
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.text.latent_dimensions = 20;
    config.coupling.dimensions = 10;
    config.clustering.level1_candidates = vec![2, 3, 4];
    config.clustering.min_subdivision_size = 10;
    config
}
