//! Configuration types for capture sessions.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::device::DeviceId;
use crate::sample::Dimensions;

/// Named bundle of resolution/quality settings requested from the capture
/// subsystem.
///
/// Photo presets configure the still pipeline; video presets configure the
/// movie pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Highest-quality still capture.
    #[default]
    Photo,
    /// 1280x720 video.
    Hd720,
    /// 1920x1080 video.
    Hd1080,
    /// Low-quality video for constrained pipelines.
    Low,
}

impl Preset {
    /// Maps the wire `type` argument to a preset, matching the plugin
    /// surface (0 = photo, 1 = 720p video, 2 = 1080p video, 3 = low;
    /// anything else falls back to photo).
    pub fn from_wire(value: i64) -> Self {
        match value {
            1 => Self::Hd720,
            2 => Self::Hd1080,
            3 => Self::Low,
            _ => Self::Photo,
        }
    }

    /// Returns `true` for still-capture presets.
    pub fn is_photo(self) -> bool {
        matches!(self, Self::Photo)
    }

    /// Default frame dimensions negotiated for this preset when the caller
    /// requests no explicit resolution.
    pub fn default_dimensions(self) -> Dimensions {
        match self {
            Self::Photo | Self::Hd1080 => Dimensions::new(1920, 1080),
            Self::Hd720 => Dimensions::new(1280, 720),
            Self::Low => Dimensions::new(640, 480),
        }
    }
}

/// Encoding requested for still images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PictureFormat {
    /// JPEG-encoded stills.
    #[default]
    Jpeg,
    /// PNG-encoded stills.
    Png,
    /// Raw frame bytes, no encoding.
    Raw,
}

/// Container format for recorded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// MPEG-4 container.
    #[default]
    Mp4,
    /// QuickTime container.
    Mov,
}

impl VideoFormat {
    /// File extension for generated output paths.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
        }
    }
}

/// Configuration for one capture session.
///
/// Set once at `initialize` and immutable for the session's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Quality preset.
    pub preset: Preset,
    /// Explicit target resolution; `None` uses the preset default.
    pub resolution: Option<Dimensions>,
    /// Still-image encoding.
    pub picture_format: PictureFormat,
    /// Video container format.
    pub video_format: VideoFormat,
    /// Whether the microphone is attached to the pipeline.
    pub audio_enabled: bool,
    /// Explicit video device; `None` selects the first available camera.
    pub device_id: Option<DeviceId>,
    /// Explicit audio device; `None` selects the first available microphone.
    pub audio_device_id: Option<DeviceId>,
}

impl SessionConfig {
    /// Resolution the session will negotiate: explicit request or the
    /// preset's default.
    pub fn target_dimensions(&self) -> Dimensions {
        self.resolution
            .unwrap_or_else(|| self.preset.default_dimensions())
    }
}

/// Tuning for the frame router and recorder channels.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Forward only 1 in N video samples to the secondary analysis tap,
    /// so per-frame analysis cannot starve the preview path.
    pub analysis_divisor: u64,

    /// Capacity of the bounded sample channel between backend and router.
    pub sample_channel_capacity: usize,

    /// Capacity of the recorder command channel. Sample forwarding uses
    /// non-blocking sends, so a full channel drops samples rather than
    /// blocking the producer.
    pub recorder_channel_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            analysis_divisor: 10,
            sample_channel_capacity: 64,
            recorder_channel_capacity: 64,
        }
    }
}

/// Per-recording options supplied to `startRecording`.
#[derive(Debug, Clone, Default)]
pub struct RecordingRequest {
    /// Output file location; `None` resolves to a generated path in the OS
    /// temp directory.
    pub url: Option<PathBuf>,
    /// Automatically stop after this duration.
    pub max_duration: Option<Duration>,
    /// Accept audio samples into this recording. `None` follows the
    /// session's audio-enabled flag.
    pub enable_audio: Option<bool>,
}
