//! Asset writer trait and implementations for recording output.
//!
//! An [`AssetWriter`] is the opaque sink that accepts time-ordered samples
//! and produces a container file. On a real platform it wraps the OS media
//! framework's writer; the crate ships:
//!
//! - [`FileAssetWriter`]: writes samples into a simple container file, so
//!   default builds produce real, non-empty output
//!
//! The recorder owns exactly one writer per recording attempt and drives it
//! from a single task, so `append` never interleaves with `finish`.

mod file;

pub use file::FileAssetWriter;

use std::path::Path;

use async_trait::async_trait;

use crate::error::WriterError;
use crate::sample::{Sample, Track};

/// The external sink that turns samples into a container file.
///
/// # Contract
///
/// - `start` is called exactly once before any `append`; a rejection here
///   fails the recording with `START_RECORDING_ERROR`
/// - `ready_for` is the per-track "ready for more data" signal the frame
///   router consults before forwarding; a `false` means drop, never block
/// - `append` receives samples already filtered for timestamp monotonicity
/// - `finish` is called exactly once; afterwards the writer is discarded
/// - a cancelled recording drops the writer without calling `finish`
#[async_trait]
pub trait AssetWriter: Send {
    /// Path of the output file this writer produces.
    fn output_path(&self) -> &Path;

    /// Opens the sink. Errors here reject the whole recording attempt.
    async fn start(&mut self) -> Result<(), WriterError>;

    /// Per-track backpressure signal.
    ///
    /// Default implementation is always ready.
    fn ready_for(&self, track: Track) -> bool {
        let _ = track;
        true
    }

    /// Appends one sample to its track.
    async fn append(&mut self, sample: &Sample) -> Result<(), WriterError>;

    /// Finalizes the output file.
    async fn finish(&mut self) -> Result<(), WriterError>;
}
