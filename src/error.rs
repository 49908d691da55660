//! Error types for camera-bridge.
//!
//! Errors are split into two categories:
//! - **Operation errors** ([`CameraError`]): Returned at the method-call
//!   boundary, each carrying a stable wire code for the response envelope
//! - **Writer errors** ([`WriterError`]): Sink-level failures inside an
//!   [`AssetWriter`](crate::AssetWriter), recovered by the recorder and
//!   reported as `ASSET_WRITER_FAIL`

use std::path::PathBuf;

/// Errors returned from plugin operations.
///
/// Every variant maps to a stable wire code via [`CameraError::code()`].
/// Failures are always recovered at the operation boundary and serialized
/// into the response envelope - they never terminate the process.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CameraError {
    /// The request arguments were missing or malformed.
    #[error("invalid arguments: {reason}")]
    InvalidArgs {
        /// What was wrong with the arguments.
        reason: String,
    },

    /// The capture session could not be set up.
    ///
    /// Covers permission denial, missing devices, unsupported presets and
    /// output attachment failures.
    #[error("camera initialization failed: {reason}")]
    Initialization {
        /// Why setup failed.
        reason: String,
    },

    /// The operation is already in progress.
    #[error("already running: {operation}")]
    Concurrency {
        /// Name of the conflicting operation.
        operation: &'static str,
    },

    /// `stopRecording` was called without an active recording.
    #[error("camera not recording")]
    NotRecording,

    /// The output sink refused to open.
    #[error("could not start recording: {reason}")]
    StartRecording {
        /// The sink's reason for refusing.
        reason: String,
    },

    /// Finalizing the output sink failed, or the output file was empty.
    #[error("asset write failed: {reason}")]
    AssetWriter {
        /// Description of the finalize failure.
        reason: String,
    },

    /// Still-image capture or encoding failed.
    #[error("photo output error: {reason}")]
    PhotoOutput {
        /// What went wrong with the still capture.
        reason: String,
    },

    /// `destroy` was called on an already-destroyed session.
    #[error("camera already destroyed")]
    AlreadyDestroyed,

    /// The requested method is not part of the plugin surface.
    #[error("method not implemented: {method}")]
    NotImplemented {
        /// The unknown method name.
        method: String,
    },
}

impl CameraError {
    /// Returns the stable wire code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgs { .. } => "INVALID_ARGS",
            Self::Initialization { .. } => "CAMERA_INITIALIZATION_ERROR",
            Self::Concurrency { .. } => "CONCURRENCY_ERROR",
            Self::NotRecording => "CAMERA_NOT_RECORDING_ERROR",
            Self::StartRecording { .. } => "START_RECORDING_ERROR",
            Self::AssetWriter { .. } => "ASSET_WRITER_FAIL",
            Self::PhotoOutput { .. } => "PHOTO_OUTPUT_ERROR",
            Self::AlreadyDestroyed => "CAMERA_DESTROY_ERROR",
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
        }
    }

    /// Creates an invalid-arguments error with the given reason.
    pub fn invalid_args(reason: impl Into<String>) -> Self {
        Self::InvalidArgs {
            reason: reason.into(),
        }
    }

    /// Creates an initialization error with the given reason.
    pub fn initialization(reason: impl Into<String>) -> Self {
        Self::Initialization {
            reason: reason.into(),
        }
    }

    /// Creates a photo-output error with the given reason.
    pub fn photo_output(reason: impl Into<String>) -> Self {
        Self::PhotoOutput {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur within an [`AssetWriter`](crate::AssetWriter).
///
/// Writer errors never cross the method-call boundary directly - the
/// recorder converts them into [`CameraError::StartRecording`] (open
/// refusal) or [`CameraError::AssetWriter`] (append/finalize failures).
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// The sink refused to open with the requested settings.
    #[error("sink rejected: {reason}")]
    Rejected {
        /// Why the sink refused to open.
        reason: String,
    },

    /// File I/O error.
    #[error("file error: {path}: {source}")]
    File {
        /// Path to the output file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A sample was appended before the sink was started.
    #[error("writer not started (call start first)")]
    NotStarted,

    /// Custom error for user-implemented writers.
    #[error("{0}")]
    Custom(String),
}

impl WriterError {
    /// Creates a rejection error with the given reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates a file error for the given path.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    /// Creates a custom writer error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_codes() {
        assert_eq!(
            CameraError::invalid_args("missing field").code(),
            "INVALID_ARGS"
        );
        assert_eq!(
            CameraError::initialization("no device").code(),
            "CAMERA_INITIALIZATION_ERROR"
        );
        assert_eq!(
            CameraError::Concurrency {
                operation: "startRecording"
            }
            .code(),
            "CONCURRENCY_ERROR"
        );
        assert_eq!(
            CameraError::NotRecording.code(),
            "CAMERA_NOT_RECORDING_ERROR"
        );
        assert_eq!(CameraError::AlreadyDestroyed.code(), "CAMERA_DESTROY_ERROR");
    }

    #[test]
    fn test_camera_error_display() {
        let err = CameraError::initialization("permission denied");
        assert_eq!(
            err.to_string(),
            "camera initialization failed: permission denied"
        );
    }

    #[test]
    fn test_writer_error_rejected() {
        let err = WriterError::rejected("unsupported settings");
        assert_eq!(err.to_string(), "sink rejected: unsupported settings");
    }

    #[test]
    fn test_writer_error_file() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = WriterError::file("/tmp/output.mp4", io_err);
        assert!(err.to_string().contains("/tmp/output.mp4"));
    }

    #[test]
    fn test_camera_error_is_clone() {
        let err = CameraError::NotRecording;
        let cloned = err.clone();
        assert_eq!(cloned.code(), "CAMERA_NOT_RECORDING_ERROR");
    }
}
