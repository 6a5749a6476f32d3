use garde::Validate;
use serde::{Deserialize, Serialize};

/// Raw per-modality authenticity scores out of the detection stage.
///
/// All score fields live in [0, 100]. `peak_risk`/`mean_risk` summarize
/// per-sample risk across frames and let the cognitive stage spot localized
/// manipulation hidden by averaging.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawScores {
    #[garde(range(min = 0.0, max = 100.0))]
    pub video_score: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub audio_score: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub synthetic_artifact_score: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub temporal_consistency: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub peak_risk: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub mean_risk: f64,

    /// Aggregate likelihood of manipulation.
    #[garde(range(min = 0.0, max = 100.0))]
    pub risk_score: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub confidence: f64,

    /// Version reported by the scoring backend, or the fallback scorer's tag.
    #[garde(skip)]
    pub model_version: Option<String>,
}

/// Quality-adjusted scores out of the compression analysis stage.
///
/// Carries the raw vector's modality scores plus the adjusted aggregate,
/// and the quality inputs that produced the adjustment, for audit.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustedScores {
    #[garde(range(min = 0.0, max = 100.0))]
    pub video_score: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub audio_score: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub synthetic_artifact_score: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub temporal_consistency: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub peak_risk: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub mean_risk: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub risk_score: f64,

    #[garde(range(min = 0.0, max = 100.0))]
    pub confidence: f64,

    /// Media quality estimate, 100 = pristine.
    #[garde(range(min = 0.0, max = 100.0))]
    pub quality_score: f64,

    /// Risk added by the codec bucket (0 for standard codecs).
    #[garde(range(min = 0.0, max = 100.0))]
    pub codec_risk_bonus: f64,

    #[garde(skip)]
    pub model_version: Option<String>,
}
