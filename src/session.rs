//! The capture session: one camera, its pipeline tasks, and its lifecycle.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::backend::{CaptureBackend, CaptureStream};
use crate::config::{PictureFormat, RecordingRequest, RouterConfig, SessionConfig};
use crate::error::CameraError;
use crate::event::{CameraEvent, EventCallback};
use crate::recording::{RecorderCommand, RecorderGate, RecordingOutput};
use crate::router::{FrameRouter, RouterStats};
use crate::sample::{Dimensions, PreviewFrame, Sample};

/// How long `take_picture` waits for a frame before giving up.
const STILL_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Texture identifiers are process-unique so a host embedding several
/// sessions can tell their preview surfaces apart.
static NEXT_TEXTURE_ID: AtomicI64 = AtomicI64::new(1);

/// A live capture session.
///
/// Owns the capture stream, the frame router task and the recorder task.
/// Created via [`CameraSession::initialize`] and torn down with
/// [`CameraSession::destroy`], which consumes the session, cancels any
/// in-flight recording and waits for both tasks to exit.
///
/// All methods take `&self`: the session is safe to share behind an `Arc`
/// and operations that must not overlap (a second `take_picture`, a second
/// `start_recording`) are rejected with a concurrency error rather than
/// queued.
pub struct CameraSession {
    backend: Arc<dyn CaptureBackend>,
    config: SessionConfig,
    texture_id: i64,
    dimensions: Dimensions,
    stream: CaptureStream,
    preview_rx: watch::Receiver<Option<PreviewFrame>>,
    recorder_tx: mpsc::Sender<RecorderCommand>,
    recorder_handle: JoinHandle<()>,
    router_handle: JoinHandle<()>,
    gate: Arc<RecorderGate>,
    stats: Arc<RouterStats>,
    taking_picture: AtomicBool,
    events: Option<EventCallback>,
}

impl CameraSession {
    /// Sets up the pipeline: permission check, stream negotiation, router
    /// and recorder tasks.
    ///
    /// `analysis_tx`, when given, receives a throttled subset of video
    /// frames (see [`RouterConfig::analysis_divisor`]).
    pub async fn initialize(
        backend: Arc<dyn CaptureBackend>,
        config: SessionConfig,
        router_config: RouterConfig,
        analysis_tx: Option<mpsc::Sender<Sample>>,
        events: Option<EventCallback>,
    ) -> Result<Self, CameraError> {
        if !backend.request_permission().await {
            return Err(CameraError::initialization("camera permission denied"));
        }

        let gate = Arc::new(RecorderGate::new());
        let stats = Arc::new(RouterStats::default());
        let (preview_tx, preview_rx) = watch::channel(None);
        let (sample_tx, sample_rx) = mpsc::channel(router_config.sample_channel_capacity);

        let (recorder_tx, recorder_handle) = crate::recording::spawn_recorder(
            Arc::clone(&gate),
            router_config.recorder_channel_capacity,
        );

        let stream = backend.open_stream(&config, sample_tx).await?;
        let dimensions = stream.dimensions();

        // Continuous focus starts at the frame center; best effort only.
        if let Err(err) = backend.set_focus_point(0.5, 0.5).await {
            tracing::debug!(error = %err, "default focus point not applied");
        }

        let router_handle = FrameRouter::spawn(
            &router_config,
            sample_rx,
            preview_tx,
            analysis_tx,
            recorder_tx.clone(),
            Arc::clone(&gate),
            Arc::clone(&stats),
            dimensions,
        );

        let texture_id = NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            texture_id,
            width = dimensions.width,
            height = dimensions.height,
            "capture session initialized"
        );

        Ok(Self {
            backend,
            config,
            texture_id,
            dimensions,
            stream,
            preview_rx,
            recorder_tx,
            recorder_handle,
            router_handle,
            gate,
            stats,
            taking_picture: AtomicBool::new(false),
            events,
        })
    }

    /// Identifier for the host's preview surface.
    pub fn texture_id(&self) -> i64 {
        self.texture_id
    }

    /// Frame dimensions negotiated with the backend.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Subscribes to the live preview slot. The slot holds only the newest
    /// frame; a slow subscriber skips frames instead of lagging.
    pub fn preview(&self) -> watch::Receiver<Option<PreviewFrame>> {
        self.preview_rx.clone()
    }

    /// Router counters for this session.
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// `true` while a recording is accepting samples.
    pub fn is_recording(&self) -> bool {
        self.gate.is_writing()
    }

    /// Captures the next video frame as an encoded still image.
    ///
    /// At most one capture runs at a time; an overlapping call fails with a
    /// concurrency error. Waits up to five seconds for a frame to arrive.
    pub async fn take_picture(
        &self,
        format: Option<PictureFormat>,
    ) -> Result<Vec<u8>, CameraError> {
        if self
            .taking_picture
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CameraError::Concurrency {
                operation: "takePicture",
            });
        }

        let result = self
            .capture_still(format.unwrap_or(self.config.picture_format))
            .await;
        self.taking_picture.store(false, Ordering::Release);
        result
    }

    async fn capture_still(&self, format: PictureFormat) -> Result<Vec<u8>, CameraError> {
        let mut preview_rx = self.preview_rx.clone();
        let frame = {
            let current = preview_rx.borrow_and_update().clone();
            match current {
                Some(frame) => frame,
                None => {
                    let next = tokio::time::timeout(STILL_CAPTURE_TIMEOUT, async {
                        loop {
                            if preview_rx.changed().await.is_err() {
                                return None;
                            }
                            if let Some(frame) = preview_rx.borrow().clone() {
                                return Some(frame);
                            }
                        }
                    })
                    .await;
                    match next {
                        Ok(Some(frame)) => frame,
                        Ok(None) => {
                            return Err(CameraError::photo_output("capture stream closed"))
                        }
                        Err(_) => {
                            return Err(CameraError::photo_output(
                                "timed out waiting for a frame",
                            ))
                        }
                    }
                }
            }
        };

        self.backend.encode_still(&frame, format).await
    }

    /// Starts recording to the requested (or a default) output path.
    ///
    /// Returns the path the recording writes to. When `max_duration` is
    /// set, a timer stops the recording automatically and reports the
    /// outcome through the session's event callback, exactly once; a
    /// manual [`stop_recording`] that wins the race disarms the timer.
    ///
    /// [`stop_recording`]: CameraSession::stop_recording
    pub async fn start_recording(
        &self,
        request: RecordingRequest,
    ) -> Result<PathBuf, CameraError> {
        let path = match request.url {
            Some(path) => path,
            None => std::env::temp_dir().join(format!(
                "output.{}",
                self.config.video_format.extension()
            )),
        };
        let audio_enabled = request
            .enable_audio
            .unwrap_or(self.config.audio_enabled);

        let writer = self
            .backend
            .create_writer(path.clone(), self.config.video_format);

        let (reply, reply_rx) = oneshot::channel();
        self.recorder_tx
            .send(RecorderCommand::Start {
                writer,
                audio_enabled,
                reply,
            })
            .await
            .map_err(|_| CameraError::AlreadyDestroyed)?;
        let generation = reply_rx
            .await
            .map_err(|_| CameraError::AlreadyDestroyed)??;

        if let Some(max_duration) = request.max_duration {
            self.arm_duration_timer(generation, max_duration);
        }

        Ok(path)
    }

    fn arm_duration_timer(&self, generation: u64, max_duration: Duration) {
        // The timer holds only a weak sender so an armed timer cannot keep
        // the recorder task alive past destroy.
        let recorder_tx = self.recorder_tx.downgrade();
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::time::sleep(max_duration).await;
            let Some(recorder_tx) = recorder_tx.upgrade() else {
                return;
            };
            let (reply, reply_rx) = oneshot::channel();
            if recorder_tx
                .send(RecorderCommand::Stop {
                    generation: Some(generation),
                    reply,
                })
                .await
                .is_err()
            {
                return;
            }
            let result = match reply_rx.await {
                Ok(result) => result,
                // Session torn down mid-finalize; nothing to report.
                Err(_) => return,
            };
            // A manual stop that won the race already reported the outcome.
            if matches!(result, Err(CameraError::NotRecording)) {
                tracing::debug!(generation, "duration timer lost to a manual stop");
                return;
            }
            tracing::info!(generation, ok = result.is_ok(), "recording auto-stopped");
            if let Some(events) = events {
                events(CameraEvent::VideoRecordingFinished { result });
            }
        });
    }

    /// Stops the current recording and returns the finalized output.
    pub async fn stop_recording(&self) -> Result<RecordingOutput, CameraError> {
        let (reply, reply_rx) = oneshot::channel();
        self.recorder_tx
            .send(RecorderCommand::Stop {
                generation: None,
                reply,
            })
            .await
            .map_err(|_| CameraError::AlreadyDestroyed)?;
        reply_rx.await.map_err(|_| CameraError::AlreadyDestroyed)?
    }

    /// Points focus and exposure at a normalized coordinate.
    pub async fn set_focus_point(&self, x: f64, y: f64) -> Result<(), CameraError> {
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return Err(CameraError::invalid_args(format!(
                "focus point out of range: ({x}, {y})"
            )));
        }
        self.backend.set_focus_point(x, y).await
    }

    /// Tears the session down.
    ///
    /// Closes the capture stream, which drains the router; the recorder
    /// then cancels any in-flight recording, discards its partial output
    /// file and exits. No completion event is dispatched for a recording
    /// interrupted this way.
    pub async fn destroy(self) {
        let Self {
            stream,
            recorder_tx,
            recorder_handle,
            router_handle,
            texture_id,
            ..
        } = self;

        drop(stream);
        drop(recorder_tx);
        // The router holds the last recorder sender; once it drains and
        // exits, the recorder's channel closes and it cleans up.
        let _ = router_handle.await;
        let _ = recorder_handle.await;
        tracing::info!(texture_id, "capture session destroyed");
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("texture_id", &self.texture_id)
            .field("dimensions", &self.dimensions)
            .field("recording", &self.gate.is_writing())
            .finish_non_exhaustive()
    }
}
