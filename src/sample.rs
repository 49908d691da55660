//! Timestamped capture samples and preview frames.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

/// The audio or video channel a sample belongs to.
///
/// Each track keeps its own last-written timestamp inside a recording, so
/// ordering is enforced per track, never across tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    /// Video frames.
    Video,
    /// Audio buffers.
    Audio,
}

impl Track {
    /// Returns a stable index for per-track bookkeeping arrays.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Video => 0,
            Self::Audio => 1,
        }
    }

    /// Human-readable track name for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel dimensions of a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Creates new dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One timestamped unit of audio or video data from the capture pipeline.
///
/// `Sample` is the fundamental unit flowing from the capture backend through
/// the frame router into the recorder. Payload bytes are `Arc`-wrapped so the
/// preview slot, the recorder and the analysis tap can share one frame
/// without copying.
///
/// The presentation timestamp lives in a monotonic clock domain owned by the
/// capture backend; the recorder only ever compares timestamps within one
/// track.
///
/// # Example
///
/// ```
/// use camera_bridge::{Dimensions, Sample, Track};
/// use std::time::Duration;
///
/// let frame = Sample::video(Duration::from_millis(33), vec![0u8; 16], Dimensions::new(4, 1));
/// assert_eq!(frame.track, Track::Video);
///
/// let clone = frame.clone(); // cheap - shares the payload
/// assert_eq!(clone.byte_len(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct Sample {
    /// Which track this sample belongs to.
    pub track: Track,
    /// Presentation timestamp, monotonic within the track.
    pub pts: Duration,
    /// Raw payload bytes, shared across pipeline stages.
    pub data: Arc<Vec<u8>>,
    /// Frame dimensions; `None` for audio samples.
    pub dimensions: Option<Dimensions>,
}

impl Sample {
    /// Creates a video sample.
    pub fn video(pts: Duration, data: Vec<u8>, dimensions: Dimensions) -> Self {
        Self {
            track: Track::Video,
            pts,
            data: Arc::new(data),
            dimensions: Some(dimensions),
        }
    }

    /// Creates an audio sample.
    pub fn audio(pts: Duration, data: Vec<u8>) -> Self {
        Self {
            track: Track::Audio,
            pts,
            data: Arc::new(data),
            dimensions: None,
        }
    }

    /// Returns the payload size in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The newest video frame, published for live preview.
///
/// Preview uses overwrite semantics: only the latest frame matters, so the
/// router replaces the previous frame instead of queueing.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Raw frame bytes, shared with the originating [`Sample`].
    pub data: Arc<Vec<u8>>,
}

impl PreviewFrame {
    /// Builds a preview frame from a video sample.
    ///
    /// Returns `None` for audio samples. Samples without dimensions fall
    /// back to the session's negotiated dimensions.
    pub fn from_sample(sample: &Sample, fallback: Dimensions) -> Option<Self> {
        if sample.track != Track::Video {
            return None;
        }
        let dims = sample.dimensions.unwrap_or(fallback);
        Some(Self {
            width: dims.width,
            height: dims.height,
            data: Arc::clone(&sample.data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_index_stable() {
        assert_eq!(Track::Video.index(), 0);
        assert_eq!(Track::Audio.index(), 1);
    }

    #[test]
    fn test_track_display() {
        assert_eq!(Track::Video.to_string(), "video");
        assert_eq!(Track::Audio.to_string(), "audio");
    }

    #[test]
    fn test_video_sample() {
        let s = Sample::video(Duration::from_millis(10), vec![1, 2, 3], Dimensions::new(1, 1));
        assert_eq!(s.track, Track::Video);
        assert_eq!(s.byte_len(), 3);
        assert_eq!(s.dimensions, Some(Dimensions::new(1, 1)));
    }

    #[test]
    fn test_audio_sample_has_no_dimensions() {
        let s = Sample::audio(Duration::ZERO, vec![0; 4]);
        assert_eq!(s.track, Track::Audio);
        assert!(s.dimensions.is_none());
    }

    #[test]
    fn test_sample_clone_shares_payload() {
        let s = Sample::video(Duration::ZERO, vec![0; 128], Dimensions::new(8, 4));
        let c = s.clone();
        assert!(Arc::ptr_eq(&s.data, &c.data));
    }

    #[test]
    fn test_preview_frame_from_video_sample() {
        let s = Sample::video(Duration::ZERO, vec![0; 12], Dimensions::new(2, 2));
        let frame = PreviewFrame::from_sample(&s, Dimensions::new(640, 480)).unwrap();
        assert_eq!(frame.width, 2);
        assert_eq!(frame.height, 2);
    }

    #[test]
    fn test_preview_frame_rejects_audio() {
        let s = Sample::audio(Duration::ZERO, vec![0; 12]);
        assert!(PreviewFrame::from_sample(&s, Dimensions::new(640, 480)).is_none());
    }

    #[test]
    fn test_preview_frame_fallback_dimensions() {
        let mut s = Sample::video(Duration::ZERO, vec![0; 12], Dimensions::new(2, 2));
        s.dimensions = None;
        let frame = PreviewFrame::from_sample(&s, Dimensions::new(640, 480)).unwrap();
        assert_eq!(frame.width, 640);
        assert_eq!(frame.height, 480);
    }
}
