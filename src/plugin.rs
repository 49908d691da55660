//! The method-call surface: named methods, JSON arguments, uniform envelope.
//!
//! Every call resolves to exactly one envelope. Success merges the payload
//! with `"error": null`; failure carries `{code, message, details}` under
//! `"error"`. Failures never propagate as Rust errors past this layer.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};

use crate::backend::CaptureBackend;
use crate::config::{
    PictureFormat, Preset, RecordingRequest, RouterConfig, SessionConfig, VideoFormat,
};
use crate::device::MediaKind;
use crate::error::CameraError;
use crate::event::EventCallback;
use crate::sample::{Dimensions, PreviewFrame, Sample};
use crate::session::CameraSession;

/// Entry point for hosts speaking the method-call protocol.
///
/// Owns at most one [`CameraSession`] at a time. Construct with a backend,
/// optionally register an event callback, then feed method calls through
/// [`handle`].
///
/// # Example
///
/// ```
/// use camera_bridge::{CameraPlugin, MockBackend};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn demo() {
/// let mut plugin = CameraPlugin::new(Arc::new(MockBackend::new()));
/// let reply = plugin.handle("initialize", json!({"type": 1})).await;
/// assert!(reply["error"].is_null());
/// assert!(reply["textureId"].is_i64());
/// # }
/// ```
///
/// [`handle`]: CameraPlugin::handle
pub struct CameraPlugin {
    backend: Arc<dyn CaptureBackend>,
    router_config: RouterConfig,
    events: Option<EventCallback>,
    analysis_tx: Option<mpsc::Sender<Sample>>,
    session: Option<CameraSession>,
}

impl CameraPlugin {
    /// Creates a plugin speaking to the given backend.
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            router_config: RouterConfig::default(),
            events: None,
            analysis_tx: None,
            session: None,
        }
    }

    /// Registers the callback for out-of-band events.
    pub fn with_events(mut self, events: EventCallback) -> Self {
        self.events = Some(events);
        self
    }

    /// Overrides router tuning for sessions created by this plugin.
    pub fn with_router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    /// Attaches a secondary analysis channel; it receives a throttled
    /// subset of video frames while a session is live.
    pub fn with_analysis_channel(mut self, tx: mpsc::Sender<Sample>) -> Self {
        self.analysis_tx = Some(tx);
        self
    }

    /// Subscribes to the live preview of the current session.
    pub fn preview(&self) -> Option<watch::Receiver<Option<PreviewFrame>>> {
        self.session.as_ref().map(|s| s.preview())
    }

    /// Dispatches one method call and returns its response envelope.
    pub async fn handle(&mut self, method: &str, args: Value) -> Value {
        tracing::debug!(method, "method call");
        match self.dispatch(method, args).await {
            Ok(data) => envelope_ok(data),
            Err(err) => {
                tracing::warn!(method, code = err.code(), error = %err, "method call failed");
                envelope_err(&err)
            }
        }
    }

    async fn dispatch(&mut self, method: &str, args: Value) -> Result<Value, CameraError> {
        match method {
            "listDevices" => self.list_devices(args).await,
            "initialize" => self.initialize(args).await,
            "takePicture" => self.take_picture(args).await,
            "startRecording" => self.start_recording(args).await,
            "stopRecording" => self.stop_recording().await,
            "setFocusPoint" => self.set_focus_point(args).await,
            "destroy" => self.destroy().await,
            other => Err(CameraError::NotImplemented {
                method: other.to_string(),
            }),
        }
    }

    fn session(&self) -> Result<&CameraSession, CameraError> {
        self.session
            .as_ref()
            .ok_or_else(|| CameraError::initialization("camera not initialized"))
    }

    async fn list_devices(&self, args: Value) -> Result<Value, CameraError> {
        let args: ListDevicesArgs = parse_args(args)?;
        let kind = match args.device_type {
            Some(ref s) => Some(
                MediaKind::parse(s)
                    .ok_or_else(|| CameraError::invalid_args(format!("deviceType: {s}")))?,
            ),
            None => None,
        };
        let devices = self.backend.list_devices(kind).await?;
        Ok(json!({ "devices": devices }))
    }

    async fn initialize(&mut self, args: Value) -> Result<Value, CameraError> {
        if self.session.is_some() {
            return Err(CameraError::Concurrency {
                operation: "initialize",
            });
        }

        let args: InitializeArgs = parse_args(args)?;
        let config = SessionConfig {
            preset: Preset::from_wire(args.r#type),
            resolution: args.resolution.map(|r| Dimensions::new(r.width, r.height)),
            picture_format: args.picture_format.unwrap_or_default(),
            video_format: args.video_format.unwrap_or_default(),
            audio_enabled: args.enable_audio.unwrap_or(true),
            device_id: args.device_id.map(Into::into),
            audio_device_id: args.audio_device_id.map(Into::into),
        };

        let session = CameraSession::initialize(
            Arc::clone(&self.backend),
            config,
            self.router_config.clone(),
            self.analysis_tx.clone(),
            self.events.clone(),
        )
        .await?;

        let devices = self.backend.list_devices(None).await.unwrap_or_default();
        let size = session.dimensions();
        let reply = json!({
            "textureId": session.texture_id(),
            "size": { "width": size.width, "height": size.height },
            "devices": devices,
        });
        self.session = Some(session);
        Ok(reply)
    }

    async fn take_picture(&self, args: Value) -> Result<Value, CameraError> {
        let args: TakePictureArgs = parse_args(args)?;
        let bytes = self.session()?.take_picture(args.picture_format).await?;
        Ok(json!({ "imageData": bytes }))
    }

    async fn start_recording(&self, args: Value) -> Result<Value, CameraError> {
        let args: StartRecordingArgs = parse_args(args)?;
        let max_duration = match args.max_video_duration {
            Some(seconds) if seconds > 0.0 => Some(Duration::from_secs_f64(seconds)),
            Some(seconds) => {
                return Err(CameraError::invalid_args(format!(
                    "maxVideoDuration must be positive, got {seconds}"
                )))
            }
            None => None,
        };

        self.session()?
            .start_recording(RecordingRequest {
                url: args.url.map(Into::into),
                max_duration,
                enable_audio: args.enable_audio,
            })
            .await?;
        Ok(json!({ "started": true }))
    }

    async fn stop_recording(&self) -> Result<Value, CameraError> {
        let output = self.session()?.stop_recording().await?;
        Ok(json!({
            "videoData": output.bytes,
            "url": output.path.to_string_lossy(),
        }))
    }

    async fn set_focus_point(&self, args: Value) -> Result<Value, CameraError> {
        let args: SetFocusPointArgs = parse_args(args)?;
        self.session()?.set_focus_point(args.x, args.y).await?;
        Ok(Value::Null)
    }

    async fn destroy(&mut self) -> Result<Value, CameraError> {
        let session = self.session.take().ok_or(CameraError::AlreadyDestroyed)?;
        session.destroy().await;
        Ok(json!(true))
    }
}

impl std::fmt::Debug for CameraPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraPlugin")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, CameraError> {
    // Methods without arguments accept null for an absent map.
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| CameraError::invalid_args(e.to_string()))
}

/// Wraps a success payload in the response envelope.
///
/// Object payloads get `"error": null` merged in; anything else lands under
/// a `"result"` key so every reply has the same shape.
fn envelope_ok(data: Value) -> Value {
    match data {
        Value::Object(mut map) => {
            map.insert("error".to_string(), Value::Null);
            Value::Object(map)
        }
        other => json!({ "result": other, "error": null }),
    }
}

fn envelope_err(err: &CameraError) -> Value {
    json!({
        "error": {
            "code": err.code(),
            "message": err.to_string(),
            "details": null,
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListDevicesArgs {
    device_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InitializeArgs {
    /// Quality preset selector: 0 = photo, 1 = 720p, 2 = 1080p, 3 = low.
    r#type: i64,
    device_id: Option<String>,
    audio_device_id: Option<String>,
    enable_audio: Option<bool>,
    picture_format: Option<PictureFormat>,
    video_format: Option<VideoFormat>,
    resolution: Option<ResolutionArgs>,
}

#[derive(Debug, Deserialize)]
struct ResolutionArgs {
    width: u32,
    height: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TakePictureArgs {
    picture_format: Option<PictureFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StartRecordingArgs {
    url: Option<String>,
    max_video_duration: Option<f64>,
    enable_audio: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetFocusPointArgs {
    #[serde(default)]
    #[allow(dead_code)]
    device_id: Option<String>,
    x: f64,
    y: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::sample::Sample;

    fn plugin_on(backend: &MockBackend) -> CameraPlugin {
        CameraPlugin::new(Arc::new(backend.clone()))
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);
        let reply = plugin.handle("selfDestruct", json!({})).await;
        assert_eq!(reply["error"]["code"], "NOT_IMPLEMENTED");
    }

    #[tokio::test]
    async fn test_malformed_arguments() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);
        let reply = plugin
            .handle("setFocusPoint", json!({"x": "left", "y": 0.5}))
            .await;
        assert_eq!(reply["error"]["code"], "INVALID_ARGS");
    }

    #[tokio::test]
    async fn test_list_devices_filter() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);

        let reply = plugin
            .handle("listDevices", json!({"deviceType": "video"}))
            .await;
        assert!(reply["error"].is_null());
        let devices = reply["devices"].as_array().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0]["deviceType"], "video");

        let reply = plugin
            .handle("listDevices", json!({"deviceType": "hologram"}))
            .await;
        assert_eq!(reply["error"]["code"], "INVALID_ARGS");
    }

    #[tokio::test]
    async fn test_initialize_envelope() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);

        let reply = plugin.handle("initialize", json!({"type": 1})).await;
        assert!(reply["error"].is_null());
        assert!(reply["textureId"].as_i64().unwrap() > 0);
        assert_eq!(reply["size"]["width"], 1280);
        assert_eq!(reply["size"]["height"], 720);
        assert_eq!(reply["devices"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_initialize_twice_is_concurrency_error() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);

        plugin.handle("initialize", json!({"type": 0})).await;
        let reply = plugin.handle("initialize", json!({"type": 0})).await;
        assert_eq!(reply["error"]["code"], "CONCURRENCY_ERROR");
    }

    #[tokio::test]
    async fn test_methods_require_initialize() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);

        let reply = plugin.handle("takePicture", Value::Null).await;
        assert_eq!(reply["error"]["code"], "CAMERA_INITIALIZATION_ERROR");

        let reply = plugin.handle("stopRecording", Value::Null).await;
        assert_eq!(reply["error"]["code"], "CAMERA_INITIALIZATION_ERROR");
    }

    #[tokio::test]
    async fn test_take_picture_flow() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);
        plugin.handle("initialize", json!({"type": 0})).await;

        backend
            .inject(Sample::video(
                Duration::ZERO,
                vec![1, 2, 3],
                Dimensions::new(3, 1),
            ))
            .await;

        let reply = plugin
            .handle("takePicture", json!({"pictureFormat": "raw"}))
            .await;
        assert!(reply["error"].is_null());
        assert_eq!(reply["imageData"], json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_recording_round_trip() {
        let backend = MockBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("clip.mp4");
        let mut plugin = plugin_on(&backend);
        plugin.handle("initialize", json!({"type": 2})).await;

        let reply = plugin
            .handle("startRecording", json!({"url": url.to_str().unwrap()}))
            .await;
        assert!(reply["error"].is_null());
        assert_eq!(reply["started"], true);

        backend
            .inject(Sample::video(
                Duration::from_millis(0),
                vec![0u8; 8],
                Dimensions::new(2, 1),
            ))
            .await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let reply = plugin.handle("stopRecording", Value::Null).await;
        assert!(reply["error"].is_null());
        assert_eq!(reply["url"], url.to_string_lossy().as_ref());
        assert!(!reply["videoData"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_recording() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);
        plugin.handle("initialize", json!({"type": 1})).await;

        let reply = plugin.handle("stopRecording", Value::Null).await;
        assert_eq!(reply["error"]["code"], "CAMERA_NOT_RECORDING_ERROR");
    }

    #[tokio::test]
    async fn test_negative_max_duration_rejected() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);
        plugin.handle("initialize", json!({"type": 1})).await;

        let reply = plugin
            .handle("startRecording", json!({"maxVideoDuration": -1.0}))
            .await;
        assert_eq!(reply["error"]["code"], "INVALID_ARGS");
    }

    #[tokio::test]
    async fn test_set_focus_point() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);
        plugin.handle("initialize", json!({"type": 0})).await;

        let reply = plugin
            .handle("setFocusPoint", json!({"x": 0.1, "y": 0.9}))
            .await;
        assert!(reply["error"].is_null());
        assert_eq!(reply["result"], Value::Null);
        assert_eq!(backend.focus_point(), Some((0.1, 0.9)));
    }

    #[tokio::test]
    async fn test_destroy_and_double_destroy() {
        let backend = MockBackend::new();
        let mut plugin = plugin_on(&backend);
        plugin.handle("initialize", json!({"type": 0})).await;

        let reply = plugin.handle("destroy", Value::Null).await;
        assert!(reply["error"].is_null());
        assert_eq!(reply["result"], true);
        assert!(!backend.is_stream_open());

        let reply = plugin.handle("destroy", Value::Null).await;
        assert_eq!(reply["error"]["code"], "CAMERA_DESTROY_ERROR");
    }
}
