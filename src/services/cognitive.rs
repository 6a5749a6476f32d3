//! Cognitive analysis stage.
//!
//! Final stage: turns the quality-adjusted score vector into a verdict with
//! confidence, uncertainty, and an ordered findings list. Thresholds are
//! context-dependent (media quality, evidence volume, uncertainty) and the
//! rule set is evaluated in a fixed order so the same snapshot always
//! reproduces the same verdict.

use crate::models::features::{FeatureBundle, MediaKind};
use crate::models::scores::AdjustedScores;
use crate::models::verdict::{Classification, ConfidenceTier, Finding, Severity, Verdict};
use crate::services::quality::LOW_BITRATE_THRESHOLD;

const BASE_DEEPFAKE_THRESHOLD: f64 = 75.0;
const BASE_SUSPICIOUS_THRESHOLD: f64 = 40.0;

/// Uncertainty above this widens thresholds and triggers a warning finding.
const HIGH_UNCERTAINTY: f64 = 20.0;

/// Sampled-frame count above which video evidence narrows the deepfake
/// threshold.
const STRONG_EVIDENCE_FRAMES: usize = 10;

/// Stage 4: adjusted scores + bundle context in, verdict out. Pure and
/// idempotent over the same snapshot.
pub fn judge(
    adjusted: &AdjustedScores,
    bundle: &FeatureBundle,
    quality_findings: &[Finding],
) -> Verdict {
    let uncertainty = derive_uncertainty(adjusted);
    let (deepfake_threshold, suspicious_threshold) =
        dynamic_thresholds(bundle, uncertainty);

    let risk = adjusted.risk_score;
    let classification = if risk >= deepfake_threshold {
        Classification::Synthetic
    } else if risk >= suspicious_threshold {
        Classification::Suspicious
    } else {
        Classification::Genuine
    };

    let mut confidence = match classification {
        Classification::Synthetic => adjusted.confidence,
        Classification::Suspicious => (adjusted.confidence - 10.0).max(50.0),
        Classification::Genuine => (100.0 - risk).min(100.0),
    };
    if uncertainty > HIGH_UNCERTAINTY {
        confidence = (confidence - uncertainty / 2.0).max(50.0);
    }

    let findings = collect_findings(adjusted, uncertainty, quality_findings);

    Verdict {
        classification,
        confidence,
        risk_score: risk,
        uncertainty,
        findings,
    }
}

/// Variance-derived uncertainty: spread of per-frame characteristics
/// (temporal inconsistency) blended with the peak-over-mean risk spread.
fn derive_uncertainty(adjusted: &AdjustedScores) -> f64 {
    let temporal_spread = 100.0 - adjusted.temporal_consistency;
    let risk_spread = (adjusted.peak_risk - adjusted.mean_risk).max(0.0);
    0.5 * temporal_spread + 0.5 * risk_spread
}

/// Context-dependent thresholds. Bounded media quality and high uncertainty
/// widen them; more evidence (single still, or a well-sampled video)
/// narrows the deepfake threshold.
fn dynamic_thresholds(bundle: &FeatureBundle, uncertainty: f64) -> (f64, f64) {
    let mut deepfake = BASE_DEEPFAKE_THRESHOLD;
    let mut suspicious = BASE_SUSPICIOUS_THRESHOLD;

    let low_bitrate = bundle
        .metadata
        .bitrate
        .is_some_and(|b| b < LOW_BITRATE_THRESHOLD);
    if low_bitrate {
        deepfake += 5.0;
        suspicious += 5.0;
    }

    if uncertainty > HIGH_UNCERTAINTY {
        deepfake += 10.0;
        suspicious += 5.0;
    }

    if bundle.kind == MediaKind::Image {
        deepfake -= 5.0;
    }
    if bundle.kind == MediaKind::Video && bundle.frame_count() > STRONG_EVIDENCE_FRAMES {
        deepfake -= 5.0;
    }

    (deepfake.clamp(60.0, 85.0), suspicious.clamp(30.0, 50.0))
}

/// Fixed ordered rule set. Rule order defines finding order.
fn collect_findings(
    adjusted: &AdjustedScores,
    uncertainty: f64,
    quality_findings: &[Finding],
) -> Vec<Finding> {
    let mut findings = Vec::new();

    if adjusted.video_score >= 80.0 {
        findings.push(Finding::new(
            Severity::High,
            "Strong synthetic indicators in visual content",
            ConfidenceTier::High,
            format!("Video modality scored {:.1}/100", adjusted.video_score),
        ));
    } else if adjusted.video_score >= 60.0 {
        findings.push(Finding::new(
            Severity::Medium,
            "Possible visual manipulation",
            ConfidenceTier::Medium,
            format!("Video modality scored {:.1}/100", adjusted.video_score),
        ));
    }

    if adjusted.audio_score >= 80.0 {
        findings.push(Finding::new(
            Severity::High,
            "Strong synthetic indicators in audio track",
            ConfidenceTier::High,
            format!("Audio modality scored {:.1}/100", adjusted.audio_score),
        ));
    } else if adjusted.audio_score >= 60.0 {
        findings.push(Finding::new(
            Severity::Medium,
            "Possible voice synthesis or audio manipulation",
            ConfidenceTier::Medium,
            format!("Audio modality scored {:.1}/100", adjusted.audio_score),
        ));
    }

    if adjusted.synthetic_artifact_score >= 75.0 {
        findings.push(Finding::new(
            Severity::High,
            "Generative-model artifact fingerprint detected",
            ConfidenceTier::High,
            format!(
                "Artifact score {:.1}/100",
                adjusted.synthetic_artifact_score
            ),
        ));
    } else if adjusted.synthetic_artifact_score >= 55.0 {
        findings.push(Finding::new(
            Severity::Medium,
            "Weak generative-model artifact traces",
            ConfidenceTier::Medium,
            format!(
                "Artifact score {:.1}/100",
                adjusted.synthetic_artifact_score
            ),
        ));
    }

    if adjusted.temporal_consistency < 60.0 {
        findings.push(Finding::new(
            Severity::Medium,
            "Inconsistent frame-to-frame characteristics",
            ConfidenceTier::Medium,
            format!(
                "Temporal consistency {:.1}/100",
                adjusted.temporal_consistency
            ),
        ));
    }

    // Short manipulated segments hide behind long genuine stretches: flag
    // when the per-sample peak clearly exceeds the aggregate.
    if adjusted.peak_risk > adjusted.risk_score + 15.0 && adjusted.peak_risk > 70.0 {
        findings.push(Finding::new(
            Severity::High,
            "Localized manipulation suspected",
            ConfidenceTier::Medium,
            format!(
                "Peak sample risk {:.1} well above aggregate {:.1}",
                adjusted.peak_risk, adjusted.risk_score
            ),
        ));
    }

    findings.extend_from_slice(quality_findings);

    if uncertainty > HIGH_UNCERTAINTY {
        findings.push(Finding::new(
            Severity::Info,
            "High analysis uncertainty",
            ConfidenceTier::Low,
            format!("Uncertainty {uncertainty:.1} exceeds {HIGH_UNCERTAINTY}"),
        ));
    }

    if findings.is_empty() {
        let (severity, message) = if adjusted.risk_score >= BASE_SUSPICIOUS_THRESHOLD {
            (Severity::Low, "Moderate aggregate risk without a dominant indicator")
        } else {
            (Severity::Info, "No strong manipulation indicators")
        };
        findings.push(Finding::new(
            severity,
            message,
            ConfidenceTier::Medium,
            format!("Aggregate risk score {:.1}/100", adjusted.risk_score),
        ));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::features::{ContainerMetadata, MediaSamples};
    use std::path::PathBuf;

    fn adjusted(risk: f64) -> AdjustedScores {
        AdjustedScores {
            video_score: 50.0,
            audio_score: 20.0,
            synthetic_artifact_score: 40.0,
            temporal_consistency: 90.0,
            peak_risk: risk,
            mean_risk: risk,
            risk_score: risk,
            confidence: 80.0,
            quality_score: 100.0,
            codec_risk_bonus: 0.0,
            model_version: None,
        }
    }

    fn video_bundle(frames: usize, bitrate: Option<u64>) -> FeatureBundle {
        FeatureBundle {
            content_hash: "cd".repeat(32),
            kind: MediaKind::Video,
            metadata: ContainerMetadata {
                bitrate,
                ..Default::default()
            },
            samples: MediaSamples {
                frames: (0..frames)
                    .map(|i| PathBuf::from(format!("frame_{i:04}.jpg")))
                    .collect(),
                audio_track: None,
            },
            geotag: None,
        }
    }

    fn image_bundle() -> FeatureBundle {
        FeatureBundle {
            content_hash: "cd".repeat(32),
            kind: MediaKind::Image,
            metadata: ContainerMetadata::default(),
            samples: MediaSamples {
                frames: vec![PathBuf::from("photo.jpg")],
                audio_track: None,
            },
            geotag: None,
        }
    }

    #[test]
    fn test_base_thresholds_classify_three_ways() {
        let bundle = video_bundle(5, None);
        assert_eq!(
            judge(&adjusted(80.0), &bundle, &[]).classification,
            Classification::Synthetic
        );
        assert_eq!(
            judge(&adjusted(50.0), &bundle, &[]).classification,
            Classification::Suspicious
        );
        assert_eq!(
            judge(&adjusted(20.0), &bundle, &[]).classification,
            Classification::Genuine
        );
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let bundle = video_bundle(5, None);
        assert_eq!(
            judge(&adjusted(75.0), &bundle, &[]).classification,
            Classification::Synthetic
        );
        assert_eq!(
            judge(&adjusted(40.0), &bundle, &[]).classification,
            Classification::Suspicious
        );
    }

    #[test]
    fn test_low_bitrate_widens_thresholds() {
        // 76 clears the base deepfake threshold but not the widened one.
        let verdict = judge(&adjusted(76.0), &video_bundle(5, Some(500_000)), &[]);
        assert_eq!(verdict.classification, Classification::Suspicious);
    }

    #[test]
    fn test_single_image_narrows_deepfake_threshold() {
        // 71 misses the video threshold (75) but hits the image one (70).
        let verdict = judge(&adjusted(71.0), &image_bundle(), &[]);
        assert_eq!(verdict.classification, Classification::Synthetic);
    }

    #[test]
    fn test_many_frames_narrow_deepfake_threshold() {
        let verdict = judge(&adjusted(71.0), &video_bundle(15, None), &[]);
        assert_eq!(verdict.classification, Classification::Synthetic);

        let few_frames = judge(&adjusted(71.0), &video_bundle(5, None), &[]);
        assert_eq!(few_frames.classification, Classification::Suspicious);
    }

    #[test]
    fn test_high_uncertainty_widens_and_dampens_confidence() {
        // Temporal consistency 40 -> uncertainty 30: thresholds widen and
        // confidence is reduced by half the uncertainty.
        let mut scores = adjusted(80.0);
        scores.temporal_consistency = 40.0;
        let verdict = judge(&scores, &video_bundle(5, None), &[]);
        assert_eq!(verdict.uncertainty, 30.0);
        // Widened deepfake threshold 85: still synthetic at risk 80? No -
        // 80 < 85, so suspicious.
        assert_eq!(verdict.classification, Classification::Suspicious);
        // Suspicious confidence 70, minus uncertainty/2 -> 55.
        assert_eq!(verdict.confidence, 55.0);
    }

    #[test]
    fn test_threshold_clamps() {
        // Low bitrate + high uncertainty would push 75+5+10 = 90; clamped 85.
        let mut scores = adjusted(86.0);
        scores.temporal_consistency = 40.0;
        let verdict = judge(&scores, &video_bundle(5, Some(100_000)), &[]);
        assert_eq!(verdict.classification, Classification::Synthetic);
    }

    #[test]
    fn test_genuine_confidence_mirrors_risk() {
        let verdict = judge(&adjusted(10.0), &video_bundle(5, None), &[]);
        assert_eq!(verdict.confidence, 90.0);
    }

    #[test]
    fn test_suspicious_confidence_reduced() {
        let verdict = judge(&adjusted(50.0), &video_bundle(5, None), &[]);
        assert_eq!(verdict.confidence, 70.0);
    }

    #[test]
    fn test_monotonic_classification() {
        let bundle = video_bundle(5, None);
        let severity = |c: Classification| match c {
            Classification::Genuine => 0,
            Classification::Suspicious => 1,
            Classification::Synthetic => 2,
        };
        let mut previous = 0;
        for risk in [0.0, 20.0, 39.9, 40.0, 60.0, 74.9, 75.0, 90.0, 100.0] {
            let current = severity(judge(&adjusted(risk), &bundle, &[]).classification);
            assert!(current >= previous, "classification regressed at risk {risk}");
            previous = current;
        }
    }

    #[test]
    fn test_idempotent_over_same_snapshot() {
        let scores = adjusted(64.0);
        let bundle = video_bundle(12, Some(700_000));
        let first = judge(&scores, &bundle, &[]);
        let second = judge(&scores, &bundle, &[]);
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn test_localized_manipulation_flagged() {
        let mut scores = adjusted(50.0);
        scores.peak_risk = 90.0;
        scores.mean_risk = 45.0;
        let verdict = judge(&scores, &video_bundle(20, None), &[]);
        assert!(verdict
            .findings
            .iter()
            .any(|f| f.message == "Localized manipulation suspected"));
    }

    #[test]
    fn test_findings_order_is_rule_order() {
        let mut scores = adjusted(70.0);
        scores.video_score = 85.0;
        scores.audio_score = 65.0;
        scores.synthetic_artifact_score = 80.0;
        let verdict = judge(&scores, &video_bundle(5, None), &[]);

        let messages: Vec<&str> = verdict.findings.iter().map(|f| f.message.as_str()).collect();
        let video_pos = messages
            .iter()
            .position(|m| m.contains("visual content"))
            .unwrap();
        let audio_pos = messages
            .iter()
            .position(|m| m.contains("audio manipulation"))
            .unwrap();
        let artifact_pos = messages
            .iter()
            .position(|m| m.contains("artifact fingerprint"))
            .unwrap();
        assert!(video_pos < audio_pos);
        assert!(audio_pos < artifact_pos);
    }

    #[test]
    fn test_quality_findings_appended_after_rules() {
        let mut scores = adjusted(70.0);
        scores.video_score = 85.0;
        let quality = vec![Finding::new(
            Severity::High,
            "Anomalous codec for container",
            ConfidenceTier::High,
            "mjpeg in video container",
        )];
        let verdict = judge(&scores, &video_bundle(5, None), &quality);

        let codec_pos = verdict
            .findings
            .iter()
            .position(|f| f.message.contains("Anomalous codec"))
            .unwrap();
        let video_pos = verdict
            .findings
            .iter()
            .position(|f| f.message.contains("visual content"))
            .unwrap();
        assert!(video_pos < codec_pos);
    }

    #[test]
    fn test_default_finding_when_no_rule_fires() {
        let mut scores = adjusted(10.0);
        scores.video_score = 10.0;
        scores.audio_score = 0.0;
        scores.synthetic_artifact_score = 10.0;
        let verdict = judge(&scores, &video_bundle(5, None), &[]);
        assert_eq!(verdict.findings.len(), 1);
        assert_eq!(
            verdict.findings[0].message,
            "No strong manipulation indicators"
        );
    }
}
