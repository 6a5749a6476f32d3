use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Base URL of the ML inference service.
    #[serde(default = "default_ml_service_url")]
    pub ml_service_url: String,

    /// Use the remote inference service; when false the deterministic local
    /// scorer runs instead.
    #[serde(default = "default_inference_enabled")]
    pub inference_enabled: bool,

    /// Per-request timeout for inference and health calls, in seconds.
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,

    /// Scoring retry budget for transient transport failures.
    #[serde(default = "default_inference_retries")]
    pub inference_retries: u32,

    /// Base backoff between scoring retries, in milliseconds.
    #[serde(default = "default_inference_backoff_ms")]
    pub inference_backoff_ms: u64,

    /// Interval between background health probes, in seconds.
    #[serde(default = "default_health_probe_interval_secs")]
    pub health_probe_interval_secs: u64,

    /// Hard cap on sampled video frames per job.
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Frame sampling rate in frames per second.
    #[serde(default = "default_frame_sample_fps")]
    pub frame_sample_fps: f64,

    /// Scratch directory for sampled frames and audio tracks.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

fn default_ml_service_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_inference_enabled() -> bool {
    true
}

fn default_inference_timeout_secs() -> u64 {
    10
}

fn default_inference_retries() -> u32 {
    3
}

fn default_inference_backoff_ms() -> u64 {
    500
}

fn default_health_probe_interval_secs() -> u64 {
    30
}

fn default_max_frames() -> usize {
    30
}

fn default_frame_sample_fps() -> f64 {
    1.0
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("media-verify")
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
