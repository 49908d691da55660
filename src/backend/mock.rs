//! Hardware-free capture backend for tests and default builds.

use std::any::Any;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::backend::{CaptureBackend, CaptureStream};
use crate::config::{PictureFormat, SessionConfig, VideoFormat};
use crate::device::{CaptureDevice, DevicePosition, MediaKind};
use crate::error::{CameraError, WriterError};
use crate::sample::{PreviewFrame, Sample};
use crate::writer::{AssetWriter, FileAssetWriter};

/// Which writer [`MockBackend::create_writer`] hands to the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriterMode {
    /// Real file-backed writer; recordings produce actual container files.
    #[default]
    File,
    /// The writer refuses to open, failing `startRecording`.
    RejectOpen,
    /// The writer accepts samples but never creates a file, so finalize
    /// reports an asset-write failure.
    NoOutput,
}

#[derive(Debug)]
struct MockState {
    devices: Vec<CaptureDevice>,
    permission: bool,
    writer_mode: WriterMode,
    focus_point: Option<(f64, f64)>,
    sample_tx: Option<mpsc::Sender<Sample>>,
}

/// In-memory [`CaptureBackend`] that lets tests drive the whole pipeline.
///
/// Instead of a hardware producer, samples enter through [`inject`]; the
/// stream guard returned from `open_stream` drops the injection channel,
/// so destroying a session closes the pipeline exactly like a real device
/// disconnect would.
///
/// By default the backend reports one camera, one microphone and granted
/// permission.
///
/// # Example
///
/// ```
/// use camera_bridge::{Dimensions, MockBackend, Sample};
/// use std::time::Duration;
///
/// # async fn demo() {
/// let backend = MockBackend::new();
/// // ... initialize a session on it, then:
/// let delivered = backend
///     .inject(Sample::video(Duration::ZERO, vec![0u8; 16], Dimensions::new(4, 1)))
///     .await;
/// assert!(delivered);
/// # }
/// ```
///
/// [`inject`]: MockBackend::inject
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Creates a backend with one camera, one microphone and permission
    /// granted.
    pub fn new() -> Self {
        let devices = vec![
            CaptureDevice {
                position: DevicePosition::Front,
                ..CaptureDevice::new("mock-camera-0", "Mock Camera", "camera-bridge", MediaKind::Video)
            },
            CaptureDevice::new("mock-mic-0", "Mock Microphone", "camera-bridge", MediaKind::Audio),
        ];
        Self {
            state: Arc::new(Mutex::new(MockState {
                devices,
                permission: true,
                writer_mode: WriterMode::default(),
                focus_point: None,
                sample_tx: None,
            })),
        }
    }

    /// Replaces the device list reported by `list_devices`.
    pub fn with_devices(self, devices: Vec<CaptureDevice>) -> Self {
        self.state.lock().unwrap().devices = devices;
        self
    }

    /// Sets whether `request_permission` grants access.
    pub fn with_permission(self, granted: bool) -> Self {
        self.state.lock().unwrap().permission = granted;
        self
    }

    /// Selects the writer behavior for subsequent recordings.
    pub fn with_writer_mode(self, mode: WriterMode) -> Self {
        self.state.lock().unwrap().writer_mode = mode;
        self
    }

    /// Pushes a sample into the open stream, as a capture device would.
    ///
    /// Returns `false` if no stream is open or the pipeline has shut down.
    pub async fn inject(&self, sample: Sample) -> bool {
        let tx = self.state.lock().unwrap().sample_tx.clone();
        match tx {
            Some(tx) => tx.send(sample).await.is_ok(),
            None => false,
        }
    }

    /// `true` while a stream guard from `open_stream` is alive.
    pub fn is_stream_open(&self) -> bool {
        self.state.lock().unwrap().sample_tx.is_some()
    }

    /// The last focus point set on the backend, if any.
    pub fn focus_point(&self) -> Option<(f64, f64)> {
        self.state.lock().unwrap().focus_point
    }
}

/// Clears the injection channel when the stream is dropped.
struct StreamGuard {
    state: Arc<Mutex<MockState>>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.state.lock().unwrap().sample_tx = None;
    }
}

#[async_trait]
impl CaptureBackend for MockBackend {
    async fn list_devices(
        &self,
        kind: Option<MediaKind>,
    ) -> Result<Vec<CaptureDevice>, CameraError> {
        let devices = self.state.lock().unwrap().devices.clone();
        Ok(devices
            .into_iter()
            .filter(|d| kind.map_or(true, |k| d.kind == k))
            .collect())
    }

    async fn request_permission(&self) -> bool {
        self.state.lock().unwrap().permission
    }

    async fn open_stream(
        &self,
        config: &SessionConfig,
        sample_tx: mpsc::Sender<Sample>,
    ) -> Result<CaptureStream, CameraError> {
        let mut state = self.state.lock().unwrap();
        if !state.permission {
            return Err(CameraError::initialization("camera permission denied"));
        }
        if let Some(ref wanted) = config.device_id {
            let known = state
                .devices
                .iter()
                .any(|d| d.kind == MediaKind::Video && d.device_id == *wanted);
            if !known {
                return Err(CameraError::initialization(format!(
                    "no such video device: {wanted}"
                )));
            }
        } else if !state.devices.iter().any(|d| d.kind == MediaKind::Video) {
            return Err(CameraError::initialization("no video device available"));
        }

        state.sample_tx = Some(sample_tx);
        let guard: Box<dyn Any + Send> = Box::new(StreamGuard {
            state: Arc::clone(&self.state),
        });
        Ok(CaptureStream::new(config.target_dimensions(), guard))
    }

    fn create_writer(&self, path: PathBuf, format: VideoFormat) -> Box<dyn AssetWriter> {
        match self.state.lock().unwrap().writer_mode {
            WriterMode::File => Box::new(FileAssetWriter::new(path, format)),
            WriterMode::RejectOpen => Box::new(RejectingWriter { path }),
            WriterMode::NoOutput => Box::new(DiscardingWriter { path }),
        }
    }

    async fn encode_still(
        &self,
        frame: &PreviewFrame,
        format: PictureFormat,
    ) -> Result<Vec<u8>, CameraError> {
        if frame.data.is_empty() {
            return Err(CameraError::photo_output("captured frame is empty"));
        }
        // Stand-in encodings: real signatures in front of the raw bytes so
        // callers can tell the formats apart.
        let bytes = match format {
            PictureFormat::Jpeg => {
                let mut out = vec![0xFF, 0xD8];
                out.extend_from_slice(&frame.data);
                out.extend_from_slice(&[0xFF, 0xD9]);
                out
            }
            PictureFormat::Png => {
                let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
                out.extend_from_slice(&frame.data);
                out
            }
            PictureFormat::Raw => frame.data.as_ref().clone(),
        };
        Ok(bytes)
    }

    async fn set_focus_point(&self, x: f64, y: f64) -> Result<(), CameraError> {
        self.state.lock().unwrap().focus_point = Some((x, y));
        Ok(())
    }
}

struct RejectingWriter {
    path: PathBuf,
}

#[async_trait]
impl AssetWriter for RejectingWriter {
    fn output_path(&self) -> &std::path::Path {
        &self.path
    }

    async fn start(&mut self) -> Result<(), WriterError> {
        Err(WriterError::rejected("mock sink configured to refuse"))
    }

    async fn append(&mut self, _sample: &Sample) -> Result<(), WriterError> {
        Err(WriterError::NotStarted)
    }

    async fn finish(&mut self) -> Result<(), WriterError> {
        Ok(())
    }
}

struct DiscardingWriter {
    path: PathBuf,
}

#[async_trait]
impl AssetWriter for DiscardingWriter {
    fn output_path(&self) -> &std::path::Path {
        &self.path
    }

    async fn start(&mut self) -> Result<(), WriterError> {
        Ok(())
    }

    async fn append(&mut self, _sample: &Sample) -> Result<(), WriterError> {
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), WriterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Dimensions;
    use std::time::Duration;

    #[tokio::test]
    async fn test_default_devices() {
        let backend = MockBackend::new();
        let all = backend.list_devices(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let cameras = backend.list_devices(Some(MediaKind::Video)).await.unwrap();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].device_id.as_str(), "mock-camera-0");
    }

    #[tokio::test]
    async fn test_open_stream_denied_without_permission() {
        let backend = MockBackend::new().with_permission(false);
        let (tx, _rx) = mpsc::channel(4);
        let err = backend
            .open_stream(&SessionConfig::default(), tx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CAMERA_INITIALIZATION_ERROR");
    }

    #[tokio::test]
    async fn test_open_stream_unknown_device() {
        let backend = MockBackend::new();
        let config = SessionConfig {
            device_id: Some("does-not-exist".into()),
            ..Default::default()
        };
        let (tx, _rx) = mpsc::channel(4);
        assert!(backend.open_stream(&config, tx).await.is_err());
    }

    #[tokio::test]
    async fn test_inject_flows_through_open_stream() {
        let backend = MockBackend::new();
        let (tx, mut rx) = mpsc::channel(4);
        let stream = backend
            .open_stream(&SessionConfig::default(), tx)
            .await
            .unwrap();
        assert!(backend.is_stream_open());

        let sample = Sample::video(Duration::ZERO, vec![1, 2, 3], Dimensions::new(1, 1));
        assert!(backend.inject(sample).await);
        assert_eq!(rx.recv().await.unwrap().byte_len(), 3);

        // Dropping the stream closes the channel and detaches injection
        drop(stream);
        assert!(!backend.is_stream_open());
        assert!(
            !backend
                .inject(Sample::audio(Duration::ZERO, vec![0]))
                .await
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_encode_still_formats() {
        let backend = MockBackend::new();
        let frame = PreviewFrame {
            width: 2,
            height: 1,
            data: Arc::new(vec![9, 9, 9]),
        };

        let jpeg = backend
            .encode_still(&frame, PictureFormat::Jpeg)
            .await
            .unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);

        let png = backend
            .encode_still(&frame, PictureFormat::Png)
            .await
            .unwrap();
        assert_eq!(&png[0..4], b"\x89PNG");

        let raw = backend
            .encode_still(&frame, PictureFormat::Raw)
            .await
            .unwrap();
        assert_eq!(raw, vec![9, 9, 9]);
    }

    #[tokio::test]
    async fn test_focus_point_is_recorded() {
        let backend = MockBackend::new();
        backend.set_focus_point(0.25, 0.75).await.unwrap();
        assert_eq!(backend.focus_point(), Some((0.25, 0.75)));
    }
}
