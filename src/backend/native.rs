//! System-camera backend built on `nokhwa`.
//!
//! Video only: `nokhwa` exposes cameras but no microphones, so audio device
//! enumeration returns empty and recordings made through this backend carry
//! a single video track.

use std::any::Any;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tokio::sync::mpsc;

use crate::backend::{CaptureBackend, CaptureStream};
use crate::config::{PictureFormat, SessionConfig, VideoFormat};
use crate::device::{CaptureDevice, MediaKind};
use crate::error::CameraError;
use crate::sample::{Dimensions, PreviewFrame, Sample};
use crate::writer::{AssetWriter, FileAssetWriter};

/// [`CaptureBackend`] backed by the operating system's camera stack.
#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    /// Creates a backend using the platform's default capture API.
    pub fn new() -> Self {
        Self
    }

    fn resolve_index(config: &SessionConfig) -> Result<CameraIndex, CameraError> {
        match config.device_id {
            Some(ref id) => {
                let index: u32 = id.as_str().parse().map_err(|_| {
                    CameraError::initialization(format!("unknown video device: {id}"))
                })?;
                Ok(CameraIndex::Index(index))
            }
            None => Ok(CameraIndex::Index(0)),
        }
    }
}

/// Signals the capture thread to stop when the stream is dropped.
struct NativeStreamGuard {
    stop: Arc<AtomicBool>,
}

impl Drop for NativeStreamGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

#[async_trait]
impl CaptureBackend for NativeBackend {
    async fn list_devices(
        &self,
        kind: Option<MediaKind>,
    ) -> Result<Vec<CaptureDevice>, CameraError> {
        if kind == Some(MediaKind::Audio) {
            return Ok(Vec::new());
        }
        let cameras = tokio::task::spawn_blocking(|| nokhwa::query(ApiBackend::Auto))
            .await
            .map_err(|e| CameraError::initialization(format!("device query panicked: {e}")))?
            .map_err(|e| CameraError::initialization(e.to_string()))?;

        Ok(cameras
            .into_iter()
            .map(|info| {
                CaptureDevice::new(
                    info.index().to_string(),
                    info.human_name(),
                    info.description().to_string(),
                    MediaKind::Video,
                )
            })
            .collect())
    }

    async fn request_permission(&self) -> bool {
        // Querying devices triggers the platform permission prompt where one
        // exists; a denied prompt surfaces as a query error.
        tokio::task::spawn_blocking(|| nokhwa::query(ApiBackend::Auto))
            .await
            .map(|result| result.is_ok())
            .unwrap_or(false)
    }

    async fn open_stream(
        &self,
        config: &SessionConfig,
        sample_tx: mpsc::Sender<Sample>,
    ) -> Result<CaptureStream, CameraError> {
        let index = Self::resolve_index(config)?;
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let (dims_tx, dims_rx) = tokio::sync::oneshot::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        // The camera is not Send on every platform, so it lives entirely on
        // its own thread; frames leave via the bounded sample channel.
        std::thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let mut camera = match Camera::new(index, requested) {
                    Ok(camera) => camera,
                    Err(err) => {
                        let _ = dims_tx.send(Err(CameraError::initialization(err.to_string())));
                        return;
                    }
                };
                if let Err(err) = camera.open_stream() {
                    let _ = dims_tx.send(Err(CameraError::initialization(err.to_string())));
                    return;
                }
                let resolution = camera.resolution();
                let dims = Dimensions::new(resolution.width(), resolution.height());
                if dims_tx.send(Ok(dims)).is_err() {
                    return;
                }

                let origin = Instant::now();
                while !thread_stop.load(Ordering::Acquire) {
                    let frame = match camera.frame() {
                        Ok(frame) => frame,
                        Err(err) => {
                            tracing::warn!(error = %err, "camera frame read failed");
                            break;
                        }
                    };
                    let decoded = match frame.decode_image::<RgbFormat>() {
                        Ok(decoded) => decoded,
                        Err(err) => {
                            tracing::debug!(error = %err, "frame decode failed, skipping");
                            continue;
                        }
                    };
                    let dims = Dimensions::new(decoded.width(), decoded.height());
                    let sample = Sample::video(origin.elapsed(), decoded.into_raw(), dims);
                    if sample_tx.blocking_send(sample).is_err() {
                        break;
                    }
                }
                tracing::debug!("camera capture thread exiting");
            })
            .map_err(|e| CameraError::initialization(format!("capture thread: {e}")))?;

        let dimensions = dims_rx
            .await
            .map_err(|_| CameraError::initialization("capture thread died during setup"))??;

        let guard: Box<dyn Any + Send> = Box::new(NativeStreamGuard { stop });
        Ok(CaptureStream::new(dimensions, guard))
    }

    fn create_writer(&self, path: PathBuf, format: VideoFormat) -> Box<dyn AssetWriter> {
        Box::new(FileAssetWriter::new(path, format))
    }

    async fn encode_still(
        &self,
        frame: &PreviewFrame,
        format: PictureFormat,
    ) -> Result<Vec<u8>, CameraError> {
        if format == PictureFormat::Raw {
            return Ok(frame.data.as_ref().clone());
        }

        let width = frame.width;
        let height = frame.height;
        let data = Arc::clone(&frame.data);
        let image_format = match format {
            PictureFormat::Jpeg => ImageFormat::Jpeg,
            PictureFormat::Png => ImageFormat::Png,
            PictureFormat::Raw => unreachable!(),
        };

        tokio::task::spawn_blocking(move || {
            let image = RgbImage::from_raw(width, height, data.as_ref().clone()).ok_or_else(
                || {
                    CameraError::photo_output(format!(
                        "frame size {} does not match {width}x{height} RGB",
                        data.len()
                    ))
                },
            )?;
            let mut out = Cursor::new(Vec::new());
            image
                .write_to(&mut out, image_format)
                .map_err(|e| CameraError::photo_output(e.to_string()))?;
            Ok(out.into_inner())
        })
        .await
        .map_err(|e| CameraError::photo_output(format!("encode task panicked: {e}")))?
    }

    async fn set_focus_point(&self, x: f64, y: f64) -> Result<(), CameraError> {
        // nokhwa exposes no focus control; accept and log so callers behave
        // the same across backends.
        tracing::debug!(x, y, "focus point ignored by native backend");
        Ok(())
    }
}
