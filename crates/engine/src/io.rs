//! JSON boundary of the batch job
//!
//! Reads the document table produced upstream and writes the assignment,
//! topic and statistics tables plus a run manifest.

use crate::fusion::FusionMode;
use crate::pipeline::PipelineOutput;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use streamforge_common::errors::{EngineError, Result};
use streamforge_common::metrics::{stage_duration_metric, STAGE_BUCKETS};
use streamforge_common::Document;
use tracing::{debug, info};
use uuid::Uuid;

pub const ASSIGNMENTS_FILE: &str = "assignments.json";
pub const NETWORK_STATS_FILE: &str = "network_stats.json";
pub const MANIFEST_FILE: &str = "run_manifest.json";
pub const METRICS_FILE: &str = "metrics.prom";

/// Topic table file name for `level`
pub fn topics_file(level: u8) -> String {
    format!("topics_level{}.json", level)
}

/// Exporter for the metrics snapshot; stage timings render as a histogram
/// over `STAGE_BUCKETS`
pub fn prometheus_builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(stage_duration_metric()), STAGE_BUCKETS)
        .map_err(|e| EngineError::config(format!("metrics buckets: {}", e)))
}

/// Load documents from a JSON array or a JSON-lines file
pub fn load_documents(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| EngineError::Io {
        message: format!("{}: {}", path.display(), e),
    })?;
    let documents = parse_documents(&raw)?;
    info!(path = %path.display(), documents = documents.len(), "Documents loaded");
    Ok(documents)
}

/// Parse a JSON array or JSON lines; blank lines are ignored
pub fn parse_documents(raw: &str) -> Result<Vec<Document>> {
    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(raw).map_err(|e| EngineError::data(format!("invalid document array: {}", e)));
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| EngineError::data(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}

/// Provenance record written next to the outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub engine_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_fingerprint: String,
    pub documents: usize,
    pub level1_k: Option<usize>,
    pub fusion_mode: Option<FusionMode>,
}

impl RunManifest {
    pub fn start(config_fingerprint: impl Into<String>, documents: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            engine_version: streamforge_common::VERSION.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            config_fingerprint: config_fingerprint.into(),
            documents,
            level1_k: None,
            fusion_mode: None,
        }
    }

    pub fn finish(&mut self, output: &PipelineOutput) {
        self.finished_at = Some(Utc::now());
        self.level1_k = Some(output.network.level1_k);
        self.fusion_mode = Some(output.network.fusion_mode);
    }
}

/// Writes output tables into one directory
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    /// Create the writer, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| EngineError::Io {
            message: format!("{}: {}", dir.display(), e),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every table and the manifest; returns the written paths
    pub fn write_all(&self, output: &PipelineOutput, manifest: &RunManifest) -> Result<Vec<PathBuf>> {
        let mut written = vec![self.write_json(ASSIGNMENTS_FILE, &output.assignments)?];
        for level in 1..=3u8 {
            written.push(self.write_json(&topics_file(level), output.topics_for_level(level))?);
        }
        written.push(self.write_json(NETWORK_STATS_FILE, &output.network)?);
        written.push(self.write_json(MANIFEST_FILE, manifest)?);

        info!(dir = %self.dir.display(), files = written.len(), "Outputs written");
        Ok(written)
    }

    /// Pretty-printed JSON file
    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let body = serde_json::to_string_pretty(value)?;
        self.write_text(name, &body)
    }

    pub fn write_text(&self, name: &str, body: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fs::write(&path, body).map_err(|e| EngineError::Io {
            message: format!("{}: {}", path.display(), e),
        })?;
        debug!(path = %path.display(), bytes = body.len(), "File written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array_and_missing_references() {
        let raw = r#"[
            {"id": "p1", "title": "A", "abstract": "x", "year": 2020, "venue": "V", "references": ["r1"]},
            {"id": "p2", "title": "B", "abstract": "y", "year": null, "venue": null}
        ]"#;
        let docs = parse_documents(raw).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].references, vec!["r1"]);
        assert!(docs[1].references.is_empty());
    }

    #[test]
    fn test_parse_json_lines() {
        let raw = "{\"id\": \"p1\", \"title\": \"A\", \"abstract\": \"x\"}\n\n{\"id\": \"p2\", \"title\": \"B\", \"abstract\": \"y\", \"references\": null}\n";
        let docs = parse_documents(raw).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].id, "p2");
        assert!(docs[1].references.is_empty());
    }

    #[test]
    fn test_bad_line_is_data_error() {
        let raw = "{\"id\": \"p1\", \"title\": \"A\", \"abstract\": \"x\"}\nnot json\n";
        let err = parse_documents(raw).unwrap_err();
        assert!(err.is_data_error());
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_writer_creates_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path().join("out")).unwrap();
        let path = writer.write_json("x.json", &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
        assert_eq!(topics_file(2), "topics_level2.json");
    }

    #[test]
    fn test_stage_timings_render_as_histogram() {
        let recorder = prometheus_builder().unwrap().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            streamforge_common::metrics::StageTimer::start("fusion").finish();
        });

        let rendered = handle.render();
        assert!(rendered.contains("# TYPE streamforge_stage_duration_seconds histogram"));
        assert!(rendered.contains("streamforge_stage_duration_seconds_bucket{"));
        assert!(rendered.contains("le=\"+Inf\""));
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let err = load_documents("/nonexistent/streamforge/documents.json").unwrap_err();
        assert_eq!(err.code(), streamforge_common::ErrorCode::IoError);
    }
}
