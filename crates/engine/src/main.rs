//! StreamForge batch runner
//!
//! Loads documents, runs the research-stream pipeline once and writes the
//! output tables, a run manifest and a Prometheus metrics snapshot.

use anyhow::Context;
use streamforge_common::{metrics, EngineConfig};
use streamforge_engine::io::{load_documents, prometheus_builder, OutputWriter, RunManifest, METRICS_FILE};
use streamforge_engine::StreamPipeline;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = EngineConfig::load().context("failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    }

    info!("Starting StreamForge v{}", streamforge_common::VERSION);

    // Initialize metrics (rendered to a file at the end, no listener)
    let prometheus = if config.observability.export_metrics {
        let handle = prometheus_builder()?
            .install_recorder()
            .context("failed to install metrics recorder")?;
        metrics::register_metrics();
        Some(handle)
    } else {
        None
    };

    let fingerprint = config.config_fingerprint()?;
    let input = config.io.input_path.clone();
    let output_dir = config.io.output_dir.clone();

    let pipeline = StreamPipeline::new(config).map_err(|e| {
        error!(error = %e, code = e.code().as_code(), "Invalid configuration");
        e
    })?;

    let documents = load_documents(&input).with_context(|| format!("failed to read documents from {}", input))?;
    let mut manifest = RunManifest::start(fingerprint, documents.len());

    let output = pipeline.run(&documents).map_err(|e| {
        error!(error = %e, code = e.code().as_code(), "Pipeline failed");
        e
    })?;
    manifest.finish(&output);

    let writer = OutputWriter::new(&output_dir).with_context(|| format!("failed to prepare {}", output_dir))?;
    writer.write_all(&output, &manifest)?;
    if let Some(handle) = prometheus {
        writer.write_text(METRICS_FILE, &handle.render())?;
    }

    info!(
        run_id = %manifest.run_id,
        documents = documents.len(),
        streams = output.network.level1_k,
        output = %writer.dir().display(),
        "Run complete"
    );
    Ok(())
}
