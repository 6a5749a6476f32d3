//! Quality/compression analysis stage.
//!
//! Consumes the feature bundle's container metadata plus the raw score
//! vector and produces quality-adjusted scores: confidence drops for
//! degraded media, risk rises only for anomalous encodings. Poor quality
//! must never by itself look more synthetic, only less analyzable.

use crate::models::features::{ContainerMetadata, FeatureBundle, MediaKind};
use crate::models::scores::{AdjustedScores, RawScores};
use crate::models::verdict::{ConfidenceTier, Finding, Severity};

/// Below this many bits per second the media counts as low-bitrate; also
/// used by the cognitive stage when widening verdict thresholds.
pub const LOW_BITRATE_THRESHOLD: u64 = 1_000_000;

/// Bitrate under which the heavy absolute-bitrate penalty applies.
const VERY_LOW_BITRATE_THRESHOLD: u64 = 300_000;

/// Bitrate-per-pixel (bps over frame area) boundaries for compression
/// penalties. 1080p at 8 Mbps sits near 3.9; heavily recompressed uploads
/// fall under 0.5.
const BPP_SEVERE: f64 = 0.5;
const BPP_MODERATE: f64 = 1.0;

/// Vertical resolution under which media counts as sub-HD.
const SUB_HD_HEIGHT: u32 = 720;

/// Risk added when a still-image codec shows up as a video stream codec.
const ANOMALOUS_CODEC_BONUS: f64 = 15.0;

/// Risk added for modern high-efficiency codecs.
const MODERN_CODEC_BONUS: f64 = 5.0;

/// Still-image codecs that are anomalous inside a video container.
const ANOMALOUS_VIDEO_CODECS: &[&str] = &["mjpeg", "png", "gif", "bmp", "tiff"];

/// Modern high-efficiency codecs.
const MODERN_CODECS: &[&str] = &["hevc", "h265", "av1", "vp9", "opus"];

/// Codec classification bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecClass {
    Standard,
    Modern,
    Anomalous,
}

/// Stage output consumed by the cognitive stage alongside the adjusted
/// vector.
#[derive(Debug, Clone)]
pub struct QualityReport {
    pub quality_score: f64,
    pub codec_class: CodecClass,
    pub codec_risk_bonus: f64,
    pub findings: Vec<Finding>,
}

/// Stage 3: raw scores + container metadata in, adjusted scores + quality
/// report out.
pub fn adjust_for_quality(bundle: &FeatureBundle, raw: &RawScores) -> (AdjustedScores, QualityReport) {
    let mut findings = Vec::new();

    let quality_score = score_quality(&bundle.metadata, &mut findings);
    let (codec_class, codec_risk_bonus) = classify_codec(bundle, &mut findings);

    let adjusted_risk = (raw.risk_score + codec_risk_bonus).min(100.0);
    let confidence_penalty = confidence_penalty(quality_score);
    let adjusted_confidence = (raw.confidence - confidence_penalty).max(0.0);

    if confidence_penalty > 0.0 {
        findings.push(Finding::new(
            Severity::Info,
            "Reduced analysis confidence due to media quality",
            ConfidenceTier::High,
            format!(
                "Quality score {quality_score:.0}/100 lowered confidence by {confidence_penalty:.0} points"
            ),
        ));
    }

    let adjusted = AdjustedScores {
        video_score: raw.video_score,
        audio_score: raw.audio_score,
        synthetic_artifact_score: raw.synthetic_artifact_score,
        temporal_consistency: raw.temporal_consistency,
        peak_risk: raw.peak_risk,
        mean_risk: raw.mean_risk,
        risk_score: adjusted_risk,
        confidence: adjusted_confidence,
        quality_score,
        codec_risk_bonus,
        model_version: raw.model_version.clone(),
    };

    let report = QualityReport {
        quality_score,
        codec_class,
        codec_risk_bonus,
        findings,
    };

    (adjusted, report)
}

/// Media quality estimate: start at 100, subtract compression penalties,
/// floor at 0. Missing metadata incurs no penalty.
fn score_quality(metadata: &ContainerMetadata, findings: &mut Vec<Finding>) -> f64 {
    let mut quality: f64 = 100.0;

    if let (Some(bitrate), Some(width), Some(height)) =
        (metadata.bitrate, metadata.width, metadata.height)
    {
        let pixels = u64::from(width) * u64::from(height);
        if pixels > 0 {
            let bpp = bitrate as f64 / pixels as f64;
            if bpp < BPP_SEVERE {
                quality -= 25.0;
                findings.push(Finding::new(
                    Severity::Medium,
                    "Heavy compression relative to resolution",
                    ConfidenceTier::High,
                    format!("{bpp:.3} bits/pixel is below the {BPP_SEVERE} threshold"),
                ));
            } else if bpp < BPP_MODERATE {
                quality -= 10.0;
                findings.push(Finding::new(
                    Severity::Low,
                    "Noticeable compression relative to resolution",
                    ConfidenceTier::Medium,
                    format!("{bpp:.3} bits/pixel is below the {BPP_MODERATE} threshold"),
                ));
            }
        }
    }

    if let Some(bitrate) = metadata.bitrate {
        if bitrate < VERY_LOW_BITRATE_THRESHOLD {
            quality -= 20.0;
            findings.push(Finding::new(
                Severity::Medium,
                "Very low bitrate",
                ConfidenceTier::High,
                format!("{bitrate} bps is below {VERY_LOW_BITRATE_THRESHOLD} bps"),
            ));
        } else if bitrate < LOW_BITRATE_THRESHOLD {
            quality -= 10.0;
            findings.push(Finding::new(
                Severity::Low,
                "Low bitrate",
                ConfidenceTier::Medium,
                format!("{bitrate} bps is below {LOW_BITRATE_THRESHOLD} bps"),
            ));
        }
    }

    if let Some(height) = metadata.height {
        if height < SUB_HD_HEIGHT {
            quality -= 15.0;
            findings.push(Finding::new(
                Severity::Low,
                "Sub-HD resolution",
                ConfidenceTier::Medium,
                format!("{height}p is below {SUB_HD_HEIGHT}p"),
            ));
        }
    }

    quality.max(0.0)
}

/// Bucket the codec string and derive the risk bonus. An unexpected
/// still-image codec inside a video container is the anomalous case.
fn classify_codec(bundle: &FeatureBundle, findings: &mut Vec<Finding>) -> (CodecClass, f64) {
    let Some(codec) = bundle.metadata.codec.as_deref() else {
        return (CodecClass::Standard, 0.0);
    };
    let codec = codec.to_lowercase();

    if bundle.kind == MediaKind::Video && ANOMALOUS_VIDEO_CODECS.contains(&codec.as_str()) {
        findings.push(Finding::new(
            Severity::High,
            "Anomalous codec for container",
            ConfidenceTier::High,
            format!("Still-image codec '{codec}' found in a video container"),
        ));
        return (CodecClass::Anomalous, ANOMALOUS_CODEC_BONUS);
    }

    if MODERN_CODECS.contains(&codec.as_str()) {
        findings.push(Finding::new(
            Severity::Info,
            "Modern high-efficiency codec",
            ConfidenceTier::Medium,
            format!("Codec '{codec}' is commonly used by re-encoding tools"),
        ));
        return (CodecClass::Modern, MODERN_CODEC_BONUS);
    }

    (CodecClass::Standard, 0.0)
}

/// Confidence reduction staircase over the quality score.
fn confidence_penalty(quality: f64) -> f64 {
    if quality < 40.0 {
        25.0
    } else if quality < 60.0 {
        15.0
    } else if quality < 80.0 {
        5.0
    } else {
        0.0
    }
}
