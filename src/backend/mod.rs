//! Capture backends: the seam between the pipeline and real hardware.
//!
//! A [`CaptureBackend`] enumerates devices, negotiates a stream and supplies
//! the writer and still encoder. Default builds get [`MockBackend`], which
//! runs the whole pipeline without hardware; the `native` feature adds
//! [`NativeBackend`] on top of the system camera stack.

mod mock;
#[cfg(feature = "native")]
mod native;

pub use mock::{MockBackend, WriterMode};
#[cfg(feature = "native")]
pub use native::NativeBackend;

use std::any::Any;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::{PictureFormat, SessionConfig, VideoFormat};
use crate::device::{CaptureDevice, MediaKind};
use crate::error::CameraError;
use crate::sample::{Dimensions, PreviewFrame, Sample};
use crate::writer::AssetWriter;

/// A running capture stream.
///
/// Holds the negotiated output dimensions and an opaque guard that keeps the
/// backend's producer alive. Dropping the stream releases the producer,
/// which closes the sample channel and lets the router task drain and exit.
pub struct CaptureStream {
    dimensions: Dimensions,
    // Mutex-wrapped so the stream (and the session holding it) is `Sync`
    // even though the guard itself is only `Send`.
    _guard: std::sync::Mutex<Box<dyn Any + Send>>,
}

impl CaptureStream {
    /// Wraps a backend-specific guard with the stream's dimensions.
    pub fn new(dimensions: Dimensions, guard: Box<dyn Any + Send>) -> Self {
        Self {
            dimensions,
            _guard: std::sync::Mutex::new(guard),
        }
    }

    /// Frame dimensions the backend actually negotiated.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}

impl std::fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStream")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

/// Platform capture implementation.
///
/// Backends produce samples into the channel handed to [`open_stream`] and
/// never see the rest of the pipeline. All hardware specifics (permission
/// prompts, format negotiation, still encoding) live behind this trait.
///
/// [`open_stream`]: CaptureBackend::open_stream
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Enumerates capture devices, optionally filtered by kind.
    async fn list_devices(
        &self,
        kind: Option<MediaKind>,
    ) -> Result<Vec<CaptureDevice>, CameraError>;

    /// Asks the platform for capture permission. `false` means denied.
    async fn request_permission(&self) -> bool;

    /// Opens a capture stream matching `config`, producing samples into
    /// `sample_tx` until the returned stream is dropped.
    async fn open_stream(
        &self,
        config: &SessionConfig,
        sample_tx: mpsc::Sender<Sample>,
    ) -> Result<CaptureStream, CameraError>;

    /// Creates the writer recordings are muxed into.
    fn create_writer(&self, path: PathBuf, format: VideoFormat) -> Box<dyn AssetWriter>;

    /// Encodes a captured frame as a still image.
    async fn encode_still(
        &self,
        frame: &PreviewFrame,
        format: PictureFormat,
    ) -> Result<Vec<u8>, CameraError>;

    /// Points continuous focus and exposure at a normalized coordinate
    /// (both axes in `[0, 1]`).
    async fn set_focus_point(&self, x: f64, y: f64) -> Result<(), CameraError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_trait_is_object_safe() {
        fn assert_dyn(_: &dyn CaptureBackend) {}
        let backend = MockBackend::new();
        assert_dyn(&backend);
    }

    #[test]
    fn test_capture_stream_reports_dimensions() {
        let stream = CaptureStream::new(Dimensions::new(1280, 720), Box::new(()));
        assert_eq!(stream.dimensions(), Dimensions::new(1280, 720));
    }
}
