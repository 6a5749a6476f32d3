use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};

/// Media kind classified during feature extraction, set once per job.
///
/// The wire spelling (`VIDEO`, `AUDIO`, ...) matches what the inference
/// service expects in its request payload.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    #[default]
    Unknown,
}

/// Container-level metadata from format inspection. Extraction is
/// best-effort: every field may be absent and downstream stages tolerate
/// absence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerMetadata {
    pub format_name: Option<String>,
    pub codec: Option<String>,
    /// Bits per second.
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_secs: Option<f64>,
    pub sample_rate: Option<u32>,
}

/// References to sampled content extracted from the media file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaSamples {
    /// Ordered frame images (video) or the image itself (image).
    pub frames: Vec<PathBuf>,
    /// Normalized audio track, when one was extracted.
    pub audio_track: Option<PathBuf>,
}

/// Geolocation tag carried by some images.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoTag {
    pub latitude: f64,
    pub longitude: f64,
}

/// Perceptual fingerprint and sampled content of one media file, produced by
/// the feature extractor and consumed by every later stage.
///
/// `content_hash` is the one mandatory field; if it cannot be computed the
/// job fails instead of producing a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureBundle {
    /// SHA-256 of the raw bytes, hex-encoded. Integrity marker and the
    /// deterministic seed for fallback scoring.
    pub content_hash: String,
    pub kind: MediaKind,
    pub metadata: ContainerMetadata,
    pub samples: MediaSamples,
    pub geotag: Option<GeoTag>,
}

impl FeatureBundle {
    /// Whether an audio track was extracted alongside the visual samples.
    pub fn has_audio(&self) -> bool {
        self.samples.audio_track.is_some()
    }

    pub fn frame_count(&self) -> usize {
        self.samples.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_wire_spelling() {
        assert_eq!(MediaKind::Video.to_string(), "VIDEO");
        assert_eq!(MediaKind::Unknown.to_string(), "UNKNOWN");
        assert_eq!("AUDIO".parse::<MediaKind>().unwrap(), MediaKind::Audio);
    }

    #[test]
    fn test_media_kind_serde_roundtrip() {
        let json = serde_json::to_string(&MediaKind::Image).unwrap();
        assert_eq!(json, "\"IMAGE\"");
        let kind: MediaKind = serde_json::from_str("\"VIDEO\"").unwrap();
        assert_eq!(kind, MediaKind::Video);
    }

    #[test]
    fn test_bundle_helpers() {
        let bundle = FeatureBundle {
            content_hash: "abc".to_string(),
            kind: MediaKind::Video,
            metadata: ContainerMetadata::default(),
            samples: MediaSamples {
                frames: vec![PathBuf::from("f1.jpg"), PathBuf::from("f2.jpg")],
                audio_track: Some(PathBuf::from("audio.wav")),
            },
            geotag: None,
        };
        assert!(bundle.has_audio());
        assert_eq!(bundle.frame_count(), 2);
    }
}
