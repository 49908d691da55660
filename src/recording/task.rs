//! The recorder task: a single owner for the state machine and writer.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::CameraError;
use crate::recording::machine::{RecordingMachine, RecordingState, SampleDisposition};
use crate::recording::{RecorderGate, RecordingOutput};
use crate::sample::{Sample, Track};
use crate::writer::AssetWriter;

/// Commands accepted by the recorder task.
///
/// Everything the recorder does arrives through this channel, including
/// samples, so state transitions and writes are naturally serialized.
pub enum RecorderCommand {
    /// Begin a recording attempt with the given sink.
    Start {
        /// The sink the attempt writes to.
        writer: Box<dyn AssetWriter>,
        /// Whether audio samples are accepted into this attempt.
        audio_enabled: bool,
        /// Resolves with the attempt's generation, or the start failure.
        reply: oneshot::Sender<Result<u64, CameraError>>,
    },
    /// A captured sample forwarded by the frame router.
    Sample(Sample),
    /// Stop the current recording and finalize the output.
    Stop {
        /// When set, the stop only applies to this generation. The duration
        /// timer uses this so it cannot stop a later recording.
        generation: Option<u64>,
        /// Resolves with the finalized output or the failure.
        reply: oneshot::Sender<Result<RecordingOutput, CameraError>>,
    },
    /// Abandon the current recording and discard partial output.
    ///
    /// No completion is reported for a cancelled attempt.
    Cancel,
}

impl std::fmt::Debug for RecorderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start { audio_enabled, .. } => f
                .debug_struct("Start")
                .field("audio_enabled", audio_enabled)
                .finish_non_exhaustive(),
            Self::Sample(sample) => f.debug_tuple("Sample").field(sample).finish(),
            Self::Stop { generation, .. } => f
                .debug_struct("Stop")
                .field("generation", generation)
                .finish_non_exhaustive(),
            Self::Cancel => write!(f, "Cancel"),
        }
    }
}

/// Spawns the recorder task.
///
/// Returns the command sender and the task handle. Dropping every sender
/// closes the channel; the task then cancels any in-flight recording,
/// removes its partial file, and exits.
pub fn spawn_recorder(
    gate: Arc<RecorderGate>,
    capacity: usize,
) -> (mpsc::Sender<RecorderCommand>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let recorder = Recorder {
        machine: RecordingMachine::new(),
        writer: None,
        gate,
    };
    let handle = tokio::spawn(recorder.run(rx));
    (tx, handle)
}

struct Recorder {
    machine: RecordingMachine,
    writer: Option<Box<dyn AssetWriter>>,
    gate: Arc<RecorderGate>,
}

impl Recorder {
    async fn run(mut self, mut rx: mpsc::Receiver<RecorderCommand>) {
        tracing::debug!("recorder task started");

        while let Some(command) = rx.recv().await {
            match command {
                RecorderCommand::Start {
                    writer,
                    audio_enabled,
                    reply,
                } => self.handle_start(writer, audio_enabled, reply).await,
                RecorderCommand::Sample(sample) => self.handle_sample(sample).await,
                RecorderCommand::Stop { generation, reply } => {
                    self.handle_stop(generation, reply).await
                }
                RecorderCommand::Cancel => self.handle_cancel().await,
            }
        }

        // Channel closed: the session is gone. Discard any partial output.
        self.handle_cancel().await;
        tracing::debug!("recorder task stopped");
    }

    async fn handle_start(
        &mut self,
        mut writer: Box<dyn AssetWriter>,
        audio_enabled: bool,
        reply: oneshot::Sender<Result<u64, CameraError>>,
    ) {
        let generation = match self.machine.begin_start(audio_enabled) {
            Ok(generation) => generation,
            Err(err) => {
                tracing::warn!(error = %err, "start rejected");
                let _ = reply.send(Err(err));
                return;
            }
        };

        // A previous file at the output path is replaced, not appended to.
        let path = writer.output_path().to_path_buf();
        if let Err(err) = tokio::fs::remove_file(&path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %err, "could not remove previous output");
            }
        }

        match writer.start().await {
            Ok(()) => {
                self.machine.sink_ready();
                self.gate.set_writing(true);
                self.gate.set_ready(Track::Video, writer.ready_for(Track::Video));
                self.gate.set_ready(Track::Audio, writer.ready_for(Track::Audio));
                self.writer = Some(writer);
                tracing::info!(
                    path = %path.display(),
                    generation,
                    audio_enabled,
                    "recording started"
                );
                let _ = reply.send(Ok(generation));
            }
            Err(err) => {
                self.machine.sink_rejected();
                self.machine.reset();
                tracing::warn!(path = %path.display(), error = %err, "sink refused to open");
                let _ = reply.send(Err(CameraError::StartRecording {
                    reason: err.to_string(),
                }));
            }
        }
    }

    async fn handle_sample(&mut self, sample: Sample) {
        match self.machine.offer_sample(sample.track, sample.pts) {
            SampleDisposition::Accepted => {
                let Some(writer) = self.writer.as_mut() else {
                    return;
                };
                if let Err(err) = writer.append(&sample).await {
                    tracing::warn!(
                        track = %sample.track,
                        error = %err,
                        "sample append failed"
                    );
                } else {
                    self.gate.record_written();
                }
                self.gate.set_ready(Track::Video, writer.ready_for(Track::Video));
                self.gate.set_ready(Track::Audio, writer.ready_for(Track::Audio));
            }
            SampleDisposition::Stale => {
                self.gate.record_stale(sample.track);
                tracing::debug!(
                    track = %sample.track,
                    pts_us = sample.pts.as_micros() as u64,
                    "stale sample dropped"
                );
            }
            SampleDisposition::AudioDisabled | SampleDisposition::NotWriting => {}
        }
    }

    async fn handle_stop(
        &mut self,
        generation: Option<u64>,
        reply: oneshot::Sender<Result<RecordingOutput, CameraError>>,
    ) {
        // A generation-tagged stop comes from a duration timer. If the
        // recording it was armed for is no longer the live one, it lost
        // the race with a manual stop and must not touch anything.
        if let Some(generation) = generation {
            if generation != self.machine.generation()
                || self.machine.state() != RecordingState::Writing
            {
                tracing::debug!(generation, "ignoring stop for finished recording");
                let _ = reply.send(Err(CameraError::NotRecording));
                return;
            }
        }

        if let Err(err) = self.machine.begin_stop() {
            let _ = reply.send(Err(err));
            return;
        }

        self.gate.set_writing(false);
        self.gate.set_ready(Track::Video, false);
        self.gate.set_ready(Track::Audio, false);

        let outcome = self.finalize().await;
        match &outcome {
            Ok(output) => {
                self.machine.finalize_ok();
                tracing::info!(
                    path = %output.path.display(),
                    bytes = output.bytes.len(),
                    "recording finished"
                );
            }
            Err(err) => {
                self.machine.finalize_failed();
                tracing::warn!(error = %err, "recording finalize failed");
            }
        }
        self.machine.reset();
        let _ = reply.send(outcome);
    }

    async fn finalize(&mut self) -> Result<RecordingOutput, CameraError> {
        let mut writer = self.writer.take().ok_or_else(|| CameraError::AssetWriter {
            reason: "no writer attached to the recording".to_string(),
        })?;
        let path = writer.output_path().to_path_buf();

        writer
            .finish()
            .await
            .map_err(|err| CameraError::AssetWriter {
                reason: err.to_string(),
            })?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| CameraError::AssetWriter {
                reason: format!("output file is missing or unreadable: {}", path.display()),
            })?;
        if bytes.is_empty() {
            return Err(CameraError::AssetWriter {
                reason: format!("output file is empty: {}", path.display()),
            });
        }

        Ok(RecordingOutput {
            duration: self.machine.recorded_duration(),
            path,
            bytes,
        })
    }

    async fn handle_cancel(&mut self) {
        self.gate.set_writing(false);
        self.gate.set_ready(Track::Video, false);
        self.gate.set_ready(Track::Audio, false);

        if let Some(writer) = self.writer.take() {
            let path = writer.output_path().to_path_buf();
            // Drop without finalizing, then remove whatever was written.
            drop(writer);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "partial recording discarded")
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not remove partial output")
                }
            }
        }
        self.machine.cancel();
    }
}
