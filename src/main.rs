use media_verify::{
    config::AppConfig,
    services::{
        detection::DetectionStage, extractor::FeatureExtractor, inference::InferenceClient,
        pipeline::AnalysisPipeline,
    },
    store::MemoryJobStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting media-verify analysis worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Register application metrics
    metrics::describe_counter!("analysis_jobs_total", "Total analysis jobs created");
    metrics::describe_counter!("analysis_jobs_completed", "Total analysis jobs completed");
    metrics::describe_counter!("analysis_jobs_failed", "Total analysis jobs that failed");
    metrics::describe_histogram!("analysis_stage_seconds", "Time spent per pipeline stage");

    // Initialize services
    let store = Arc::new(MemoryJobStore::new());
    let extractor = FeatureExtractor::new(
        config.max_frames,
        config.frame_sample_fps,
        config.work_dir.clone(),
    );

    let mut prober = None;
    let detector = if config.inference_enabled {
        tracing::info!(url = %config.ml_service_url, "Initializing inference client");
        let client = Arc::new(
            InferenceClient::new(
                &config.ml_service_url,
                Duration::from_secs(config.inference_timeout_secs),
                config.inference_retries,
                Duration::from_millis(config.inference_backoff_ms),
                Duration::from_secs(config.health_probe_interval_secs),
            )
            .expect("Failed to initialize inference client"),
        );
        prober = Some(client.spawn_prober());
        DetectionStage::remote(client)
    } else {
        tracing::info!("Inference disabled, using local deterministic scorer");
        DetectionStage::local()
    };

    let pipeline = Arc::new(AnalysisPipeline::new(store, extractor, detector));

    // One independent task per job; jobs share nothing but the store.
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        tracing::warn!("No input files given; nothing to analyze");
        return;
    }

    let mut handles = Vec::new();
    for path in paths {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            match pipeline.analyze(path.as_ref()).await {
                Ok(job) => match serde_json::to_string_pretty(&job) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::error!(error = %e, "Failed to serialize job record"),
                },
                Err(e) => tracing::error!(path = %path, error = %e, "Job storage error"),
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Analysis task panicked");
        }
    }

    if let Some(prober) = prober {
        prober.abort();
    }
}
