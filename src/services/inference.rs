//! Resilient client for the external scoring service.
//!
//! Isolates the pipeline from the availability and latency of the inference
//! backend: cached health state driven by a background prober, bounded
//! per-call timeout, and a fixed retry budget with increasing backoff for
//! transient transport failures. When the backend cannot be reached the
//! client reports "unavailable" instead of blocking a job indefinitely.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::features::{ContainerMetadata, FeatureBundle};
use crate::models::scores::RawScores;

/// Cached backend health: `Unknown → Healthy ⟷ Unhealthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl HealthState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference service unavailable: backend unhealthy")]
    Unhealthy,

    #[error("inference service unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    #[error("inference service returned HTTP {0}")]
    Status(StatusCode),

    #[error("failed to decode inference response: {0}")]
    Decode(String),
}

/// Scoring request sent to the backend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreRequest<'a> {
    content_hash: &'a str,
    media_kind: String,
    metadata: &'a ContainerMetadata,
    sample_refs: Vec<String>,
}

/// Scoring response. The backend is accepted in either snake_case or
/// camelCase spelling; any missing numeric field defaults to zero.
#[derive(Debug, Default, Deserialize)]
pub struct ScoreResponse {
    #[serde(default, alias = "videoScore")]
    pub video_score: f64,

    #[serde(default, alias = "audioScore")]
    pub audio_score: f64,

    #[serde(default, alias = "ganFingerprint")]
    pub gan_fingerprint: f64,

    #[serde(default, alias = "temporalConsistency")]
    pub temporal_consistency: f64,

    #[serde(default, alias = "peakRisk")]
    pub peak_risk: f64,

    #[serde(default, alias = "meanRisk")]
    pub mean_risk: f64,

    #[serde(default, alias = "riskScore")]
    pub risk_score: f64,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default, alias = "modelVersion")]
    pub model_version: Option<String>,

    #[serde(default, alias = "inferenceTime")]
    pub inference_time: Option<u64>,
}

impl ScoreResponse {
    /// Normalize into the canonical score vector, clamping every score into
    /// [0, 100].
    pub fn into_raw_scores(self) -> RawScores {
        let clamp = |v: f64| v.clamp(0.0, 100.0);
        RawScores {
            video_score: clamp(self.video_score),
            audio_score: clamp(self.audio_score),
            synthetic_artifact_score: clamp(self.gan_fingerprint),
            temporal_consistency: clamp(self.temporal_consistency),
            peak_risk: clamp(self.peak_risk),
            mean_risk: clamp(self.mean_risk),
            risk_score: clamp(self.risk_score),
            confidence: clamp(self.confidence),
            model_version: self.model_version,
        }
    }
}

/// Client for the deepfake scoring backend.
///
/// The health flag is an atomic shared between the background prober and
/// concurrent job tasks; `spawn_prober` starts the probe loop and returns
/// its handle (abort the handle to stop it).
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
    backoff: Duration,
    probe_interval: Duration,
    health: AtomicU8,
}

impl InferenceClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        retries: u32,
        backoff: Duration,
        probe_interval: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retries: retries.max(1),
            backoff,
            probe_interval,
            health: AtomicU8::new(HealthState::Unknown as u8),
        })
    }

    pub fn health(&self) -> HealthState {
        HealthState::from_u8(self.health.load(Ordering::SeqCst))
    }

    fn set_health(&self, state: HealthState) {
        self.health.store(state as u8, Ordering::SeqCst);
    }

    /// Probe the backend health endpoint once and update the cached state.
    pub async fn probe(&self) -> HealthState {
        let url = format!("{}/health", self.base_url);
        let state = match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => HealthState::Healthy,
            Ok(response) => {
                debug!(status = %response.status(), "Health probe returned non-success");
                HealthState::Unhealthy
            }
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                HealthState::Unhealthy
            }
        };
        self.set_health(state);
        state
    }

    /// Start the background probe loop. Runs until the returned handle is
    /// aborted; independent of any job's lifecycle.
    pub fn spawn_prober(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(client.probe_interval);
            loop {
                ticker.tick().await;
                let state = client.probe().await;
                debug!(state = ?state, "Background health probe");
            }
        })
    }

    /// Score a feature bundle against the backend.
    ///
    /// If the cached state is unhealthy, one fresh probe runs before failing
    /// fast. Transport and timeout errors are retried up to the configured
    /// budget with increasing backoff; HTTP error statuses are model-level
    /// failures and are not retried.
    pub async fn score(&self, bundle: &FeatureBundle) -> Result<RawScores, InferenceError> {
        if self.health() == HealthState::Unhealthy {
            info!("Inference backend marked unhealthy, probing before fail-fast");
            if self.probe().await == HealthState::Unhealthy {
                return Err(InferenceError::Unhealthy);
            }
        }

        let request = build_request(bundle);
        let url = format!("{}/api/v1/inference", self.base_url);
        let mut last_error = String::new();

        for attempt in 1..=self.retries {
            match self.http.post(&url).json(&request).send().await {
                Ok(response) if response.status().is_success() => {
                    let decoded: ScoreResponse = response
                        .json()
                        .await
                        .map_err(|e| InferenceError::Decode(e.to_string()))?;
                    self.set_health(HealthState::Healthy);
                    debug!(
                        attempt,
                        model = decoded.model_version.as_deref().unwrap_or("unknown"),
                        inference_ms = decoded.inference_time.unwrap_or_default(),
                        "Inference succeeded"
                    );
                    return Ok(decoded.into_raw_scores());
                }
                Ok(response) => {
                    // Deterministic model-level failure: no retry.
                    let status = response.status();
                    if status.is_server_error() {
                        self.set_health(HealthState::Unhealthy);
                    }
                    return Err(InferenceError::Status(status));
                }
                Err(e) => {
                    warn!(attempt, retries = self.retries, error = %e, "Inference transport failure");
                    last_error = e.to_string();
                }
            }

            if attempt < self.retries {
                tokio::time::sleep(self.backoff * attempt).await;
            }
        }

        self.set_health(HealthState::Unhealthy);
        Err(InferenceError::Unavailable {
            attempts: self.retries,
            last_error,
        })
    }
}

fn build_request(bundle: &FeatureBundle) -> serde_json::Value {
    let mut sample_refs: Vec<String> = bundle
        .samples
        .frames
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    if let Some(audio) = &bundle.samples.audio_track {
        sample_refs.push(audio.display().to_string());
    }

    serde_json::to_value(ScoreRequest {
        content_hash: &bundle.content_hash,
        media_kind: bundle.kind.to_string(),
        metadata: &bundle.metadata,
        sample_refs,
    })
    .unwrap_or_default()
}
