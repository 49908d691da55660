//! Out-of-band events pushed to the host application.
//!
//! Events cover outcomes that do not belong to any pending method call,
//! most importantly the completion of a duration-limited recording that
//! stopped itself.

use std::sync::Arc;

use crate::error::CameraError;
use crate::recording::RecordingOutput;

/// Events pushed outside the request/response cycle.
#[derive(Debug, Clone)]
pub enum CameraEvent {
    /// A recording finished without a caller-driven `stopRecording`,
    /// typically because the max-duration timer fired.
    ///
    /// Dispatched exactly once per auto-stopped recording.
    VideoRecordingFinished {
        /// The finalized output, or the failure that ended the recording.
        result: Result<RecordingOutput, CameraError>,
    },
}

/// Callback type for receiving out-of-band events.
///
/// Register via [`CameraPlugin::with_events()`] to be notified when a
/// duration-limited recording completes on its own.
///
/// [`CameraPlugin::with_events()`]: crate::CameraPlugin::with_events
pub type EventCallback = Arc<dyn Fn(CameraEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use camera_bridge::{event_callback, CameraEvent};
///
/// let callback = event_callback(|event| {
///     if let CameraEvent::VideoRecordingFinished { result } = event {
///         println!("recording finished: {}", result.is_ok());
///     }
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(CameraEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_callback_helper() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let callback = event_callback(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        callback(CameraEvent::VideoRecordingFinished {
            result: Err(CameraError::NotRecording),
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_is_clone() {
        let event = CameraEvent::VideoRecordingFinished {
            result: Err(CameraError::AssetWriter {
                reason: "disk full".to_string(),
            }),
        };
        let CameraEvent::VideoRecordingFinished { result } = event.clone();
        assert!(result.is_err());
    }
}
