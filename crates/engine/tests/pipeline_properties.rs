//! End-to-end behavior of the research-stream pipeline

mod common;

use std::collections::{BTreeMap, BTreeSet};
use streamforge_common::{Document, UNCLASSIFIED_PATH};
use streamforge_engine::cluster::NodeKind;
use streamforge_engine::fusion::FusionMode;
use streamforge_engine::io::{OutputWriter, RunManifest, ASSIGNMENTS_FILE, MANIFEST_FILE};
use streamforge_engine::{AssignmentRow, PipelineOutput, StreamPipeline};

fn run(docs: &[Document], coupling_weight: f64) -> PipelineOutput {
    let mut config = common::test_config();
    config.fusion.coupling_weight = coupling_weight;
    StreamPipeline::new(config).unwrap().run(docs).unwrap()
}

/// Level-1 groups as sets of input rows
fn level1_groups(assignments: &[AssignmentRow]) -> BTreeSet<BTreeSet<usize>> {
    let mut groups: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
    for (row, a) in assignments.iter().enumerate() {
        groups.entry(a.l1.as_str()).or_default().insert(row);
    }
    groups.into_values().collect()
}

#[test]
fn test_coupling_recovers_engineered_groups() {
    let docs = common::two_group_corpus(25, 2024);

    let hybrid = run(&docs, 3.0);
    let text_only = run(&docs, 0.0);

    let expected: BTreeSet<BTreeSet<usize>> = [(0..25).collect(), (25..50).collect()].into_iter().collect();
    assert_eq!(level1_groups(&hybrid.assignments), expected);
    assert_eq!(hybrid.network.level1_k, 2);
    assert_eq!(hybrid.network.fusion_mode, FusionMode::Hybrid);
    assert_eq!(text_only.network.fusion_mode, FusionMode::TextOnly);
    assert!(
        hybrid.network.level1_quality > text_only.network.level1_quality,
        "hybrid {} vs text-only {}",
        hybrid.network.level1_quality,
        text_only.network.level1_quality
    );
}

#[test]
fn test_partition_completeness() {
    let docs = common::two_group_corpus(25, 99);
    let output = run(&docs, 1.0);
    let tree = &output.tree;

    assert!(output.assignments.iter().all(|a| !a.l1.is_empty()));

    for id in tree.level_ids(1) {
        let node = tree.node(id);
        if node.kind == NodeKind::Unclassified {
            continue;
        }
        let mut union: Vec<usize> = node.children.iter().flat_map(|&c| tree.node(c).members.clone()).collect();
        let total = union.len();
        union.sort_unstable();
        union.dedup();
        assert_eq!(union.len(), total, "duplicate member under {}", node.path);
        assert_eq!(union, node.members, "members lost under {}", node.path);

        for &row in &node.members {
            assert!(output.assignments[row].l2.is_some());
            assert!(output.assignments[row].l3.is_some());
        }
    }

    let level2_total: usize = output.topics_for_level(2).iter().map(|t| t.size).sum();
    assert_eq!(level2_total, docs.len());
}

#[test]
fn test_rerun_is_identical() {
    let docs = common::two_group_corpus(25, 7);
    let first = run(&docs, 1.0);
    let second = run(&docs, 1.0);

    assert_eq!(first.assignments, second.assignments);
    assert_eq!(first.topics, second.topics);
}

#[test]
fn test_missing_citations_match_zero_coupling_weight() {
    let docs: Vec<Document> = common::two_group_corpus(25, 5)
        .into_iter()
        .map(|mut d| {
            d.references.clear();
            d
        })
        .collect();

    let with_weight = run(&docs, 1.0);
    let without = run(&docs, 0.0);

    assert_eq!(with_weight.network.coupling.edge_count, 0);
    assert_eq!(with_weight.network.fusion_mode, FusionMode::TextOnly);
    assert_eq!(level1_groups(&with_weight.assignments), level1_groups(&without.assignments));
}

#[test]
fn test_oversized_candidates_leave_groups_whole() {
    let docs = common::two_group_corpus(25, 13);
    let mut config = common::test_config();
    config.clustering.level2_candidates = vec![500];
    let output = StreamPipeline::new(config).unwrap().run(&docs).unwrap();

    for topic in output.topics_for_level(2) {
        assert_eq!(topic.kind, NodeKind::Passthrough);
        let parent = topic.parent_path.as_deref().unwrap();
        assert_eq!(topic.path, format!("{}.1", parent));
        let parent_size = output.tree.get(parent).map(|n| n.size()).unwrap();
        assert_eq!(topic.size, parent_size);
    }
}

#[test]
fn test_documents_without_signal_are_unclassified() {
    let mut docs = common::two_group_corpus(25, 21);
    docs.push(Document::new("empty", "", ""));
    let output = run(&docs, 3.0);

    let row = output.assignments.last().unwrap();
    assert_eq!(row.id, "empty");
    assert_eq!(row.l1, UNCLASSIFIED_PATH);
    assert_eq!(row.l1_label, "unclassified");
    assert!(row.l2.is_none() && row.l3.is_none());
    assert_eq!(output.network.unclassified_documents, 1);
    assert_eq!(output.network.level1_k, 2);
}

#[test]
fn test_cited_documents_without_text_never_join_a_topic() {
    let mut docs = common::two_group_corpus(25, 31);
    for i in 0..2 {
        let refs: Vec<String> = (0..8).map(|r| format!("ref-a-{}", r)).collect();
        docs.push(Document::new(format!("bare-{}", i), "", "").with_references(refs));
    }
    let output = run(&docs, 3.0);
    let tree = &output.tree;
    let memberships = tree.memberships(docs.len());

    assert_eq!(output.network.unclassified_documents, 0);
    for row in [50, 51] {
        let assignment = &output.assignments[row];
        assert_ne!(assignment.l1, UNCLASSIFIED_PATH);
        let level2 = tree.node(memberships[row][1].unwrap());
        assert_ne!(level2.kind, NodeKind::Cluster, "{} placed in topic {}", assignment.id, level2.path);
        assert_eq!(assignment.l2_label, Some(assignment.l1_label.clone()));
        assert!(assignment.l3.is_some());
    }
}

#[test]
fn test_outputs_written_to_directory() {
    let docs = common::two_group_corpus(15, 1);
    let mut config = common::test_config();
    config.clustering.min_subdivision_size = 5;
    let fingerprint = config.config_fingerprint().unwrap();
    let output = StreamPipeline::new(config).unwrap().run(&docs).unwrap();

    let mut manifest = RunManifest::start(fingerprint.clone(), docs.len());
    manifest.finish(&output);

    let dir = tempfile::tempdir().unwrap();
    let writer = OutputWriter::new(dir.path()).unwrap();
    let written = writer.write_all(&output, &manifest).unwrap();
    assert_eq!(written.len(), 6);

    let raw = std::fs::read_to_string(dir.path().join(ASSIGNMENTS_FILE)).unwrap();
    let rows: Vec<AssignmentRow> = serde_json::from_str(&raw).unwrap();
    assert_eq!(rows, output.assignments);

    let raw = std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
    let back: RunManifest = serde_json::from_str(&raw).unwrap();
    assert_eq!(back.config_fingerprint, fingerprint);
    assert!(back.finished_at.is_some());
}
