//! Detection stage.
//!
//! Turns a feature bundle into raw per-modality authenticity scores, either
//! through the resilient inference client or a deterministic local fallback
//! seeded by the content hash. Pure with respect to its input: the same
//! bundle always yields the same scores.

use std::sync::Arc;
use tracing::debug;

use crate::models::features::{FeatureBundle, MediaKind};
use crate::models::scores::RawScores;
use crate::services::inference::{InferenceClient, InferenceError};

/// Aggregate risk weights: video, audio, synthetic artifact, temporal
/// inconsistency.
const RISK_WEIGHTS: (f64, f64, f64, f64) = (0.4, 0.3, 0.2, 0.1);

/// Version tag stamped on fallback-produced scores.
const FALLBACK_MODEL_VERSION: &str = "heuristic-v1";

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Stage 2: feature bundle in, raw score vector out.
pub struct DetectionStage {
    inference: Option<Arc<InferenceClient>>,
}

impl DetectionStage {
    /// Delegate scoring to the remote inference service.
    pub fn remote(client: Arc<InferenceClient>) -> Self {
        Self {
            inference: Some(client),
        }
    }

    /// Score locally with the deterministic reference heuristic.
    pub fn local() -> Self {
        Self { inference: None }
    }

    pub async fn detect(&self, bundle: &FeatureBundle) -> Result<RawScores, DetectError> {
        match &self.inference {
            Some(client) => {
                let scores = client.score(bundle).await?;
                debug!(
                    risk = scores.risk_score,
                    confidence = scores.confidence,
                    "Remote detection complete"
                );
                Ok(scores)
            }
            None => Ok(fallback_scores(bundle)),
        }
    }
}

/// Deterministic seed: the first 8 hex characters of the content hash
/// parsed as an integer, zero when unparsable.
pub fn seed_from_hash(content_hash: &str) -> u64 {
    let prefix = &content_hash[..content_hash.len().min(8)];
    u64::from_str_radix(prefix, 16).unwrap_or(0)
}

/// Reference scoring heuristic used when inference is disabled.
///
/// Per-modality scores are seed-modulo ranges conditioned on the media kind;
/// the aggregate risk is a fixed weighted sum. A placeholder for a real
/// model, kept for parity and testability.
pub fn fallback_scores(bundle: &FeatureBundle) -> RawScores {
    let seed = seed_from_hash(&bundle.content_hash);

    let (video_score, audio_score, temporal_consistency) = match bundle.kind {
        MediaKind::Video => {
            let video = 30.0 + (seed % 70) as f64;
            let audio = if bundle.has_audio() {
                20.0 + (seed % 80) as f64
            } else {
                0.0
            };
            let temporal = 50.0 + (seed % 50) as f64;
            (video, audio, temporal)
        }
        MediaKind::Image => (35.0 + (seed % 65) as f64, 0.0, 100.0),
        MediaKind::Audio => (0.0, 20.0 + (seed % 80) as f64, 100.0),
        MediaKind::Unknown => (0.0, 0.0, 100.0),
    };

    let synthetic_artifact_score = 25.0 + (seed % 75) as f64;

    let (w_video, w_audio, w_synth, w_temporal) = RISK_WEIGHTS;
    let risk_score = (w_video * video_score
        + w_audio * audio_score
        + w_synth * synthetic_artifact_score
        + w_temporal * (100.0 - temporal_consistency))
        .clamp(0.0, 100.0);

    // Bounded seed-derived jitter in [-10, 10].
    let jitter = (seed % 21) as f64 - 10.0;
    let confidence = (risk_score + jitter).clamp(50.0, 100.0);

    RawScores {
        video_score,
        audio_score,
        synthetic_artifact_score,
        temporal_consistency,
        peak_risk: risk_score,
        mean_risk: risk_score,
        risk_score,
        confidence,
        model_version: Some(FALLBACK_MODEL_VERSION.to_string()),
    }
}
