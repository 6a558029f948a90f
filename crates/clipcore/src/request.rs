//! Request model and builder.
//!
//! A `DownloadRequest` is immutable once built; one request drives exactly
//! one pipeline run. The builder applies the defaults of the downstream
//! editing workflow (merged video, H.264 passthrough, unbounded quality,
//! WAV audio, firefox cookies).

use crate::config;
use crate::error::{PipelineError, PipelineResult};
use std::path::PathBuf;
use url::Url;

/// Which streams of the source asset to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MediaSelection {
    /// Video merged with audio (default)
    #[strum(serialize = "both")]
    Both,
    /// Video stream; uses the same merged selector chain as `Both`
    #[strum(serialize = "video")]
    Video,
    /// Audio-only extraction
    #[strum(serialize = "audio")]
    Audio,
}

impl MediaSelection {
    pub fn is_audio(self) -> bool {
        matches!(self, MediaSelection::Audio)
    }
}

/// Target video codec for the final file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CodecTarget {
    /// Keep what the downloader produced (H.264 in an mp4 container)
    H264,
    /// Re-encode to ProRes 422 HQ in a mov container after download
    Prores,
}

/// Quality ceiling for video requests.
///
/// Tiers map to maximum pixel heights; anything unrecognized normalizes
/// to `Max` (no height constraint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    P144,
    P360,
    P480,
    P720,
    P1080,
    K4,
    Max,
}

impl QualityTier {
    /// Normalize a user-supplied quality label. Unrecognized labels fall
    /// back to `Max` rather than failing the request.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "144" => QualityTier::P144,
            "360" => QualityTier::P360,
            "480" => QualityTier::P480,
            "720" => QualityTier::P720,
            "1080" => QualityTier::P1080,
            "4k" => QualityTier::K4,
            _ => QualityTier::Max,
        }
    }

    /// Maximum pixel height for this tier, or None for unbounded.
    pub fn max_height(self) -> Option<u32> {
        match self {
            QualityTier::P144 => Some(144),
            QualityTier::P360 => Some(360),
            QualityTier::P480 => Some(480),
            QualityTier::P720 => Some(720),
            QualityTier::P1080 => Some(1080),
            QualityTier::K4 => Some(2160),
            QualityTier::Max => None,
        }
    }
}

/// Output container for audio-only requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AudioContainer {
    Mp3,
    Wav,
}

impl AudioContainer {
    /// Exactly two containers are supported; anything that is not mp3 is wav.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("mp3") {
            AudioContainer::Mp3
        } else {
            AudioContainer::Wav
        }
    }
}

/// Requested time sub-range of the asset, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_secs: u64,
    pub end_secs: u64,
}

impl TimeRange {
    pub fn duration_secs(&self) -> u64 {
        self.end_secs - self.start_secs
    }
}

/// Explicit tool path overrides; each wins over auto-detection.
#[derive(Debug, Clone, Default)]
pub struct ToolOverrides {
    pub ytdlp: Option<String>,
    pub ffmpeg: Option<String>,
    pub deno: Option<String>,
}

/// Parameters for one download-and-postprocess run.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// URL to download from
    pub url: Url,
    /// Which streams to fetch
    pub selection: MediaSelection,
    /// Target codec for the final file
    pub codec: CodecTarget,
    /// Quality ceiling for video requests
    pub quality: QualityTier,
    /// Output container for audio-only requests
    pub audio_container: AudioContainer,
    /// Destination directory; created if missing
    pub destination: PathBuf,
    /// Optional time sub-range (both ends required, end > start)
    pub time_range: Option<TimeRange>,
    /// Browser to extract authentication cookies from
    pub cookie_browser: String,
    /// Explicit tool path overrides
    pub overrides: ToolOverrides,
}

/// Builder for `DownloadRequest`.
///
/// # Example
///
/// ```ignore
/// let request = DownloadRequestBuilder::new(url)
///     .quality_label("720")
///     .codec(CodecTarget::Prores)
///     .time_range(60, 150)
///     .build()?;
/// ```
pub struct DownloadRequestBuilder {
    url: Url,
    selection: MediaSelection,
    codec: CodecTarget,
    quality: QualityTier,
    audio_container: AudioContainer,
    destination: Option<PathBuf>,
    time_range: Option<(u64, u64)>,
    cookie_browser: Option<String>,
    overrides: ToolOverrides,
}

impl DownloadRequestBuilder {
    /// Create a new builder for the given URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            selection: MediaSelection::Both,
            codec: CodecTarget::H264,
            quality: QualityTier::Max,
            audio_container: AudioContainer::Wav,
            destination: None,
            time_range: None,
            cookie_browser: None,
            overrides: ToolOverrides::default(),
        }
    }

    pub fn selection(mut self, selection: MediaSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn codec(mut self, codec: CodecTarget) -> Self {
        self.codec = codec;
        self
    }

    pub fn quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    /// Set the quality from a user-supplied label (e.g. "720", "4k").
    pub fn quality_label(mut self, label: &str) -> Self {
        self.quality = QualityTier::from_label(label);
        self
    }

    pub fn audio_container(mut self, container: AudioContainer) -> Self {
        self.audio_container = container;
        self
    }

    /// Set the audio container from a user-supplied label.
    pub fn audio_container_label(mut self, label: &str) -> Self {
        self.audio_container = AudioContainer::from_label(label);
        self
    }

    /// Override the destination directory.
    pub fn destination(mut self, dir: impl Into<PathBuf>) -> Self {
        self.destination = Some(dir.into());
        self
    }

    /// Restrict the download to [start, end) seconds of the asset.
    pub fn time_range(mut self, start_secs: u64, end_secs: u64) -> Self {
        self.time_range = Some((start_secs, end_secs));
        self
    }

    /// Browser to extract cookies from (e.g. "firefox", "chrome").
    pub fn cookie_browser(mut self, browser: &str) -> Self {
        self.cookie_browser = Some(browser.to_string());
        self
    }

    pub fn tool_overrides(mut self, overrides: ToolOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Validate and build the request.
    pub fn build(self) -> PipelineResult<DownloadRequest> {
        let time_range = match self.time_range {
            Some((start, end)) if end > start => Some(TimeRange {
                start_secs: start,
                end_secs: end,
            }),
            Some((start, end)) => {
                return Err(PipelineError::InvalidRequest(format!(
                    "time range end ({end}s) must be after start ({start}s)"
                )));
            }
            None => None,
        };

        Ok(DownloadRequest {
            url: self.url,
            selection: self.selection,
            codec: self.codec,
            quality: self.quality,
            audio_container: self.audio_container,
            destination: self.destination.unwrap_or_else(config::download_dir),
            time_range,
            cookie_browser: self
                .cookie_browser
                .unwrap_or_else(|| config::COOKIE_BROWSER.clone()),
            overrides: self.overrides,
        })
    }
}
