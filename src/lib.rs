//! # camera-bridge
//!
//! Bridges a method-call plugin interface to a native camera/microphone
//! capture backend: device enumeration, a capture session with live preview,
//! still capture, and duration-limited video recording with a strict
//! per-track timestamp ordering contract.
//!
//! The platform media stack sits behind two traits, [`CaptureBackend`] and
//! [`AssetWriter`], so the session controller, frame router and recording
//! state machine are testable without hardware. Default builds ship
//! [`MockBackend`] plus a file-backed writer; the `native` feature adds a
//! real camera backend.
//!
//! ## Architecture
//!
//! ```text
//! CaptureBackend ──samples──> FrameRouter ──┬──> preview slot (watch)
//!                                           ├──> analysis tap (1 in N)
//!                                           └──> recorder task ──> AssetWriter
//! ```
//!
//! The router never blocks the capture producer: preview frames overwrite,
//! recorder forwarding is a non-blocking send gated on the recorder's state,
//! and the analysis tap is throttled. The recorder task serializes every
//! start/stop/sample through one channel, so the recording state machine is
//! driven from a single place.
//!
//! ## Example
//!
//! ```
//! use camera_bridge::{CameraPlugin, MockBackend, Dimensions, Sample};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let backend = MockBackend::new();
//! let mut plugin = CameraPlugin::new(Arc::new(backend.clone()));
//!
//! let reply = plugin.handle("initialize", json!({"type": 1})).await;
//! assert!(reply["error"].is_null());
//!
//! backend
//!     .inject(Sample::video(Duration::ZERO, vec![0u8; 12], Dimensions::new(2, 2)))
//!     .await;
//!
//! let reply = plugin.handle("takePicture", json!({"pictureFormat": "raw"})).await;
//! assert!(reply["error"].is_null());
//!
//! plugin.handle("destroy", json!(null)).await;
//! # }
//! ```

mod backend;
mod config;
mod device;
mod error;
mod event;
mod plugin;
mod recording;
mod router;
mod sample;
mod session;
mod writer;

pub use backend::{CaptureBackend, CaptureStream, MockBackend, WriterMode};
#[cfg(feature = "native")]
pub use backend::NativeBackend;
pub use config::{
    PictureFormat, Preset, RecordingRequest, RouterConfig, SessionConfig, VideoFormat,
};
pub use device::{CaptureDevice, DeviceId, DevicePosition, MediaKind};
pub use error::{CameraError, WriterError};
pub use event::{event_callback, CameraEvent, EventCallback};
pub use plugin::CameraPlugin;
pub use recording::{RecorderGate, RecordingOutput, RecordingState};
pub use router::RouterStats;
pub use sample::{Dimensions, PreviewFrame, Sample, Track};
pub use session::CameraSession;
pub use writer::{AssetWriter, FileAssetWriter};
