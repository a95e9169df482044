//! Metrics and observability utilities
//!
//! Describes the engine's counters, gauges and histograms with a shared
//! naming convention. Recording is a no-op until a recorder is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all StreamForge metrics
pub const METRICS_PREFIX: &str = "streamforge";

/// Buckets for pipeline stage latency (in seconds); batch stages run long
pub const STAGE_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
    15.00,  // 15s
    60.00,  // 1min
    300.0,  // 5min
    1800.0, // 30min
];

/// Name of the stage latency histogram; exporters bucket it with `STAGE_BUCKETS`
pub fn stage_duration_metric() -> String {
    format!("{}_stage_duration_seconds", METRICS_PREFIX)
}

/// Register all metric descriptions
pub fn register_metrics() {
    describe_histogram!(
        stage_duration_metric(),
        Unit::Seconds,
        "Pipeline stage latency in seconds"
    );

    describe_counter!(
        format!("{}_documents_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents entering the pipeline"
    );

    describe_gauge!(
        format!("{}_vocabulary_size", METRICS_PREFIX),
        Unit::Count,
        "Terms surviving document-frequency filters"
    );

    describe_gauge!(
        format!("{}_explained_variance_ratio", METRICS_PREFIX),
        Unit::Count,
        "Fraction of text matrix energy captured by the latent space"
    );

    describe_gauge!(
        format!("{}_coupling_edges", METRICS_PREFIX),
        Unit::Count,
        "Undirected coupling edges in the network"
    );

    describe_counter!(
        format!("{}_coupling_pair_visits_total", METRICS_PREFIX),
        Unit::Count,
        "Document pairs enumerated from inverted-index buckets"
    );

    describe_gauge!(
        format!("{}_cluster_nodes", METRICS_PREFIX),
        Unit::Count,
        "Cluster nodes per hierarchy level"
    );

    describe_counter!(
        format!("{}_candidates_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Candidate cluster counts that could not be evaluated"
    );

    describe_gauge!(
        format!("{}_level1_quality", METRICS_PREFIX),
        Unit::Count,
        "Mean silhouette width of the selected Level-1 partition"
    );

    describe_counter!(
        format!("{}_unclassified_documents_total", METRICS_PREFIX),
        Unit::Count,
        "Documents with neither usable text nor coupling edges"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record stage timings
pub struct StageTimer {
    start: Instant,
    stage: &'static str,
}

impl StageTimer {
    /// Start timing a pipeline stage
    pub fn start(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    /// Record stage completion and return the elapsed seconds
    pub fn finish(self) -> f64 {
        let duration = self.start.elapsed().as_secs_f64();

        histogram!(stage_duration_metric(), "stage" => self.stage)
        .record(duration);

        duration
    }
}

/// Helper to record corpus-level metrics
pub fn record_corpus(documents: usize, vocabulary: usize, explained_variance: f64) {
    counter!(format!("{}_documents_processed_total", METRICS_PREFIX)).increment(documents as u64);
    gauge!(format!("{}_vocabulary_size", METRICS_PREFIX)).set(vocabulary as f64);
    gauge!(format!("{}_explained_variance_ratio", METRICS_PREFIX)).set(explained_variance);
}

/// Helper to record coupling network metrics
pub fn record_coupling(edges: usize, pair_visits: u64) {
    gauge!(format!("{}_coupling_edges", METRICS_PREFIX)).set(edges as f64);
    counter!(format!("{}_coupling_pair_visits_total", METRICS_PREFIX)).increment(pair_visits);
}

/// Helper to record the outcome of one hierarchy level
pub fn record_level(level: u8, nodes: usize, skipped_candidates: usize) {
    gauge!(
        format!("{}_cluster_nodes", METRICS_PREFIX),
        "level" => level.to_string()
    )
    .set(nodes as f64);

    counter!(
        format!("{}_candidates_skipped_total", METRICS_PREFIX),
        "level" => level.to_string()
    )
    .increment(skipped_candidates as u64);
}

/// Helper to record the selected Level-1 quality
pub fn record_level1_quality(silhouette: f64, unclassified: usize) {
    gauge!(format!("{}_level1_quality", METRICS_PREFIX)).set(silhouette);
    counter!(format!("{}_unclassified_documents_total", METRICS_PREFIX)).increment(unclassified as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_buckets() {
        let mut prev = 0.0;
        for &bucket in STAGE_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_stage_metric_name() {
        assert_eq!(stage_duration_metric(), "streamforge_stage_duration_seconds");
    }

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start("text_features");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let elapsed = timer.finish();
        assert!(elapsed > 0.0);
    }
}
