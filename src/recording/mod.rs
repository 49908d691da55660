//! Recording lifecycle: state machine, shared gate, and the recorder task.
//!
//! All recorder mutations flow through one command channel into a single
//! task, so start/stop/sample handling never races. The [`RecorderGate`]
//! mirrors the fast-changing bits (writing flag, per-track readiness) into
//! atomics the frame router can consult without locking.

mod machine;
mod task;

pub use machine::{RecordingMachine, RecordingState, SampleDisposition};
pub use task::{spawn_recorder, RecorderCommand};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::sample::Track;

/// The finalized result of a completed recording.
#[derive(Debug, Clone)]
pub struct RecordingOutput {
    /// Where the container file was written.
    pub path: PathBuf,
    /// The full file contents, read back after finalize.
    pub bytes: Vec<u8>,
    /// Span between the first and last accepted sample timestamps.
    pub duration: Option<Duration>,
}

/// Lock-free view of the recorder's hot state, shared with the router.
///
/// The router checks `is_writing` and `ready` on every sample, so these
/// live in atomics rather than behind the recorder's command channel.
#[derive(Debug, Default)]
pub struct RecorderGate {
    writing: AtomicBool,
    ready: [AtomicBool; 2],
    stale_dropped: [AtomicU64; 2],
    samples_written: AtomicU64,
    overflow_dropped: AtomicU64,
}

impl RecorderGate {
    /// Creates a gate with recording off and both tracks not ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a recording is accepting samples.
    pub fn is_writing(&self) -> bool {
        self.writing.load(Ordering::Acquire)
    }

    pub(crate) fn set_writing(&self, value: bool) {
        self.writing.store(value, Ordering::Release);
    }

    /// Per-track readiness mirrored from the writer. A track that is not
    /// ready drops samples instead of blocking the producer.
    pub fn ready(&self, track: Track) -> bool {
        self.ready[track.index()].load(Ordering::Acquire)
    }

    pub(crate) fn set_ready(&self, track: Track, value: bool) {
        self.ready[track.index()].store(value, Ordering::Release);
    }

    /// Count of samples dropped for arriving with an out-of-order timestamp.
    pub fn stale_dropped(&self, track: Track) -> u64 {
        self.stale_dropped[track.index()].load(Ordering::Relaxed)
    }

    pub(crate) fn record_stale(&self, track: Track) {
        self.stale_dropped[track.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Total samples appended to the writer across all attempts.
    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Relaxed)
    }

    pub(crate) fn record_written(&self) {
        self.samples_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Samples the router dropped because the recorder channel was full.
    pub fn overflow_dropped(&self) -> u64 {
        self.overflow_dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn record_overflow(&self) {
        self.overflow_dropped.fetch_add(1, Ordering::Relaxed);
    }
}
