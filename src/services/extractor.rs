//! Media feature extraction.
//!
//! Stage 1 of the pipeline: hashes the file, inspects its container,
//! classifies the media kind, and samples frames/audio for scoring.
//! Everything except hashing is best-effort — a failed sub-step logs a
//! warning and leaves the corresponding field absent.
//!
//! Container inspection and sampling shell out to `ffprobe`/`ffmpeg`, and
//! geotag extraction to `exiftool`; all three are optional host tools.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::models::features::{
    ContainerMetadata, FeatureBundle, GeoTag, MediaKind, MediaSamples,
};

/// Container/extension tokens classified as video. First matching set wins.
pub const VIDEO_FORMAT_TOKENS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "matroska", "webm", "m4v", "mpeg", "mpg", "wmv", "flv",
    "quicktime", "3gp",
];

/// Container/extension tokens classified as audio.
pub const AUDIO_FORMAT_TOKENS: &[&str] = &[
    "mp3", "wav", "aac", "flac", "ogg", "oga", "m4a", "opus", "wma", "aiff",
];

/// Container/extension tokens classified as image.
pub const IMAGE_FORMAT_TOKENS: &[&str] = &[
    "jpg", "jpeg", "jpeg_pipe", "png", "png_pipe", "gif", "webp", "webp_pipe", "bmp", "bmp_pipe",
    "tif", "tiff", "tiff_pipe", "heic", "image2",
];

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Hashing is the one extraction step that is not best-effort.
    #[error("failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors from the optional host tools; always caught locally.
#[derive(Debug, thiserror::Error)]
enum ToolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("output parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

/// Stage 1: file path in, `FeatureBundle` out.
pub struct FeatureExtractor {
    max_frames: usize,
    frame_sample_fps: f64,
    work_dir: PathBuf,
}

impl FeatureExtractor {
    pub fn new(max_frames: usize, frame_sample_fps: f64, work_dir: PathBuf) -> Self {
        Self {
            max_frames,
            frame_sample_fps,
            work_dir,
        }
    }

    /// Extract a feature bundle from the file at `path`.
    ///
    /// Only a hashing failure is fatal; every other sub-step degrades to an
    /// absent field.
    pub async fn extract(&self, path: &Path) -> Result<FeatureBundle, ExtractError> {
        let content_hash = hash_file(path).await?;
        debug!(path = %path.display(), hash = %content_hash, "Content hashed");

        let mut metadata = match probe_container(path).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Container inspection failed, falling back to extension");
                ContainerMetadata::default()
            }
        };

        let kind = classify_media_kind(metadata.format_name.as_deref(), path);
        debug!(path = %path.display(), kind = %kind, "Media kind classified");

        if kind == MediaKind::Image {
            fill_image_metadata(path, &mut metadata);
        }

        let geotag = if kind == MediaKind::Image {
            match extract_geotag(path).await {
                Ok(tag) => tag,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Geotag extraction failed");
                    None
                }
            }
        } else {
            None
        };

        let samples = self.collect_samples(path, kind, &content_hash).await;

        Ok(FeatureBundle {
            content_hash,
            kind,
            metadata,
            samples,
            geotag,
        })
    }

    async fn collect_samples(
        &self,
        path: &Path,
        kind: MediaKind,
        content_hash: &str,
    ) -> MediaSamples {
        match kind {
            MediaKind::Image => MediaSamples {
                frames: vec![path.to_path_buf()],
                audio_track: None,
            },
            MediaKind::Video => {
                let job_dir = self.job_dir(content_hash);
                let frames = match self.sample_frames(path, &job_dir).await {
                    Ok(frames) => frames,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Frame sampling failed");
                        Vec::new()
                    }
                };
                let audio_track = match extract_audio_track(path, &job_dir).await {
                    Ok(track) => track,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Audio track extraction failed");
                        None
                    }
                };
                MediaSamples {
                    frames,
                    audio_track,
                }
            }
            MediaKind::Audio => {
                let job_dir = self.job_dir(content_hash);
                let audio_track = match extract_audio_track(path, &job_dir).await {
                    Ok(track) => track,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Audio normalization failed");
                        None
                    }
                };
                MediaSamples {
                    frames: Vec::new(),
                    audio_track,
                }
            }
            MediaKind::Unknown => MediaSamples::default(),
        }
    }

    fn job_dir(&self, content_hash: &str) -> PathBuf {
        let prefix = &content_hash[..content_hash.len().min(16)];
        self.work_dir.join(prefix)
    }

    /// Sample frames at a fixed rate, hard-capped at `max_frames` to bound
    /// memory.
    async fn sample_frames(&self, path: &Path, job_dir: &Path) -> Result<Vec<PathBuf>, ToolError> {
        let frames_dir = job_dir.join("frames");
        tokio::fs::create_dir_all(&frames_dir).await?;

        let status = Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-i"])
            .arg(path)
            .arg("-vf")
            .arg(format!("fps={}", self.frame_sample_fps))
            .arg("-frames:v")
            .arg(self.max_frames.to_string())
            .arg(frames_dir.join("frame_%04d.jpg"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(ToolError::Failed(format!("ffmpeg exited with {status}")));
        }

        let mut frames = Vec::new();
        let mut entries = tokio::fs::read_dir(&frames_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let frame = entry.path();
            if frame.extension().is_some_and(|ext| ext == "jpg") {
                frames.push(frame);
            }
        }
        // ffmpeg numbers frames sequentially; name order is sample order.
        frames.sort();
        frames.truncate(self.max_frames);
        Ok(frames)
    }
}

/// Streaming SHA-256 over the raw bytes, hex-encoded.
async fn hash_file(path: &Path) -> Result<String, ExtractError> {
    let owned = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || -> Result<String, std::io::Error> {
        let mut file = std::fs::File::open(&owned)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| ExtractError::Hash {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;

    result.map_err(|source| ExtractError::Hash {
        path: path.to_path_buf(),
        source,
    })
}

/// Classify the media kind from container format tokens and the file
/// extension, matched against the three fixed keyword sets. First match
/// wins; video is checked before audio before image.
pub fn classify_media_kind(format_name: Option<&str>, path: &Path) -> MediaKind {
    let mut tokens: Vec<String> = format_name
        .map(|name| name.split(',').map(|t| t.trim().to_lowercase()).collect())
        .unwrap_or_default();

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        tokens.push(ext.to_lowercase());
    }

    let matches_set = |set: &[&str]| tokens.iter().any(|t| set.contains(&t.as_str()));

    if matches_set(VIDEO_FORMAT_TOKENS) {
        MediaKind::Video
    } else if matches_set(AUDIO_FORMAT_TOKENS) {
        MediaKind::Audio
    } else if matches_set(IMAGE_FORMAT_TOKENS) {
        MediaKind::Image
    } else {
        MediaKind::Unknown
    }
}

// ── ffprobe container inspection ─────────────────────────────────────────

#[derive(Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    streams: Option<Vec<ProbeStream>>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    bit_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
}

async fn probe_container(path: &Path) -> Result<ContainerMetadata, ToolError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ToolError::Failed(format!(
            "ffprobe exited with {}",
            output.status
        )));
    }

    let probe: ProbeOutput = serde_json::from_slice(&output.stdout)?;
    let mut metadata = ContainerMetadata::default();

    if let Some(format) = probe.format {
        metadata.format_name = format.format_name;
        metadata.bitrate = format.bit_rate.and_then(|b| b.parse().ok());
        metadata.duration_secs = format.duration.and_then(|d| d.parse().ok());
    }

    for stream in probe.streams.unwrap_or_default() {
        match stream.codec_type.as_deref() {
            Some("video") if metadata.codec.is_none() => {
                metadata.codec = stream.codec_name;
                metadata.width = stream.width;
                metadata.height = stream.height;
            }
            Some("audio") if metadata.sample_rate.is_none() => {
                metadata.sample_rate = stream.sample_rate.and_then(|r| r.parse().ok());
            }
            _ => {}
        }
    }

    Ok(metadata)
}

/// Fill resolution and format for images when ffprobe left them absent.
fn fill_image_metadata(path: &Path, metadata: &mut ContainerMetadata) {
    if metadata.width.is_none() || metadata.height.is_none() {
        match image::image_dimensions(path) {
            Ok((width, height)) => {
                metadata.width = Some(width);
                metadata.height = Some(height);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Image dimension probe failed");
            }
        }
    }

    if metadata.format_name.is_none() {
        if let Ok(bytes) = std::fs::read(path) {
            if let Ok(format) = image::guess_format(&bytes) {
                metadata.format_name = format.extensions_str().first().map(|s| s.to_string());
            }
        }
    }
}

// ── exiftool geotag extraction ───────────────────────────────────────────

#[derive(Deserialize)]
struct ExifGps {
    #[serde(rename = "GPSLatitude")]
    latitude: Option<f64>,
    #[serde(rename = "GPSLongitude")]
    longitude: Option<f64>,
}

async fn extract_geotag(path: &Path) -> Result<Option<GeoTag>, ToolError> {
    let output = Command::new("exiftool")
        .args(["-j", "-n", "-GPSLatitude", "-GPSLongitude"])
        .arg(path)
        .stderr(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(ToolError::Failed(format!(
            "exiftool exited with {}",
            output.status
        )));
    }

    let records: Vec<ExifGps> = serde_json::from_slice(&output.stdout)?;
    Ok(records.first().and_then(|gps| {
        match (gps.latitude, gps.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoTag {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }))
}

/// Normalize the audio track to mono 16 kHz WAV for the scoring backend.
async fn extract_audio_track(path: &Path, job_dir: &Path) -> Result<Option<PathBuf>, ToolError> {
    tokio::fs::create_dir_all(job_dir).await?;
    let wav_path = job_dir.join("audio.wav");

    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-i"])
        .arg(path)
        .args(["-vn", "-ac", "1", "-ar", "16000"])
        .arg(&wav_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    if !status.success() {
        // Video containers without an audio stream land here.
        return Ok(None);
    }

    Ok(Some(wav_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(
            classify_media_kind(None, Path::new("clip.mp4")),
            MediaKind::Video
        );
        assert_eq!(
            classify_media_kind(None, Path::new("voice.mp3")),
            MediaKind::Audio
        );
        assert_eq!(
            classify_media_kind(None, Path::new("photo.JPEG")),
            MediaKind::Image
        );
        assert_eq!(
            classify_media_kind(None, Path::new("notes.txt")),
            MediaKind::Unknown
        );
    }

    #[test]
    fn test_classify_by_format_tokens() {
        // ffprobe reports compound format names for mp4-family containers.
        assert_eq!(
            classify_media_kind(Some("mov,mp4,m4a,3gp,3g2,mj2"), Path::new("clip.bin")),
            MediaKind::Video
        );
        assert_eq!(
            classify_media_kind(Some("ogg"), Path::new("sound.bin")),
            MediaKind::Audio
        );
        assert_eq!(
            classify_media_kind(Some("png_pipe"), Path::new("shot.bin")),
            MediaKind::Image
        );
    }

    #[test]
    fn test_video_set_checked_first() {
        // A token list containing both video and audio tokens classifies as
        // video because the video set is matched first.
        assert_eq!(
            classify_media_kind(Some("mov,mp4,m4a"), Path::new("file.m4a")),
            MediaKind::Video
        );
    }

    #[tokio::test]
    async fn test_hash_file_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.bin");
        std::fs::write(&path, b"hello world").unwrap();

        let hash = hash_file(&path).await.unwrap();
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn test_hash_missing_file_is_fatal() {
        let result = hash_file(Path::new("/nonexistent/clip.mp4")).await;
        assert!(matches!(result, Err(ExtractError::Hash { .. })));
    }

    #[tokio::test]
    async fn test_extract_image_bundle_without_host_tools() {
        // A real PNG written via the image crate: extraction must classify
        // it, hash it, and fill dimensions even with ffprobe absent.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.png");
        image::RgbImage::new(4, 2).save(&path).unwrap();

        let extractor = FeatureExtractor::new(30, 1.0, dir.path().join("work"));
        let bundle = extractor.extract(&path).await.unwrap();

        assert_eq!(bundle.kind, MediaKind::Image);
        assert_eq!(bundle.content_hash.len(), 64);
        assert_eq!(bundle.samples.frames, vec![path]);
        assert!(bundle.samples.audio_track.is_none());
        assert_eq!(bundle.metadata.width, Some(4));
        assert_eq!(bundle.metadata.height, Some(2));
    }

    #[tokio::test]
    async fn test_extract_unknown_kind_still_produces_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.dat");
        std::fs::write(&path, b"opaque bytes").unwrap();

        let extractor = FeatureExtractor::new(30, 1.0, dir.path().join("work"));
        let bundle = extractor.extract(&path).await.unwrap();

        assert_eq!(bundle.kind, MediaKind::Unknown);
        assert!(bundle.samples.frames.is_empty());
        assert!(bundle.geotag.is_none());
    }

    /// Requires ffmpeg/ffprobe on the host.
    /// Run with: cargo test test_extract_video -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_extract_video_samples_frames() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");

        // Synthesize a 3-second test clip.
        let status = std::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=duration=3:size=320x240:rate=10"])
            .arg(&clip)
            .status()
            .unwrap();
        assert!(status.success());

        let extractor = FeatureExtractor::new(30, 1.0, dir.path().join("work"));
        let bundle = extractor.extract(&clip).await.unwrap();

        assert_eq!(bundle.kind, MediaKind::Video);
        assert!(!bundle.samples.frames.is_empty());
        assert!(bundle.metadata.bitrate.is_some());
        assert_eq!(bundle.metadata.width, Some(320));
    }
}
