//! The recording lifecycle state machine.
//!
//! `RecordingMachine` is pure state: it decides transitions and sample
//! admission but performs no I/O. The recorder task drives it and talks to
//! the writer, which keeps every rule here unit-testable without a sink.

use std::time::Duration;

use crate::error::CameraError;
use crate::sample::Track;

/// Lifecycle states of one recording attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// No recording in progress.
    Idle,
    /// Output sink is being opened.
    Opening,
    /// Sink accepted; samples are being written.
    Writing,
    /// Tracks are finished; sink is finalizing.
    Finishing,
    /// Finalize succeeded; terminal until reset.
    Completed,
    /// Open or finalize failed; terminal until reset.
    Failed,
}

/// Verdict for a sample offered to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDisposition {
    /// Timestamp is in order; write it and advance `last_written`.
    Accepted,
    /// Timestamp is older than the track's last write; drop permanently.
    Stale,
    /// Audio was not requested for this recording attempt.
    AudioDisabled,
    /// No recording is accepting samples right now.
    NotWriting,
}

/// Tracks the state and per-track ordering contract of recording attempts.
///
/// Invariants:
/// - at most one attempt is ever in a non-`Idle`, non-terminal state
/// - within a track, accepted timestamps never decrease
/// - a stale sample never moves `last_written` and is never retried
#[derive(Debug)]
pub struct RecordingMachine {
    state: RecordingState,
    generation: u64,
    audio_enabled: bool,
    last_written: [Option<Duration>; 2],
    clock_origin: Option<Duration>,
    end_time: Option<Duration>,
    stale_dropped: [u64; 2],
    accepted: [u64; 2],
}

impl Default for RecordingMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingMachine {
    /// Creates a machine in `Idle`.
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            generation: 0,
            audio_enabled: true,
            last_written: [None, None],
            clock_origin: None,
            end_time: None,
            stale_dropped: [0, 0],
            accepted: [0, 0],
        }
    }

    /// Current state.
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Generation counter of the current (or most recent) attempt.
    ///
    /// Bumped on every successful `begin_start`, so a stale duration timer
    /// from an earlier attempt can be told apart from the live one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` while an attempt is in `Opening`, `Writing` or `Finishing`.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            RecordingState::Opening | RecordingState::Writing | RecordingState::Finishing
        )
    }

    /// `Idle -> Opening`. Rejected unless currently `Idle`.
    pub fn begin_start(&mut self, audio_enabled: bool) -> Result<u64, CameraError> {
        if self.state != RecordingState::Idle {
            return Err(CameraError::Concurrency {
                operation: "startRecording",
            });
        }
        self.state = RecordingState::Opening;
        self.generation += 1;
        self.audio_enabled = audio_enabled;
        self.last_written = [None, None];
        self.clock_origin = None;
        self.end_time = None;
        self.stale_dropped = [0, 0];
        self.accepted = [0, 0];
        Ok(self.generation)
    }

    /// `Opening -> Writing`: the sink confirmed it can begin.
    pub fn sink_ready(&mut self) {
        debug_assert_eq!(self.state, RecordingState::Opening);
        self.state = RecordingState::Writing;
    }

    /// `Opening -> Failed`: the sink refused to open.
    pub fn sink_rejected(&mut self) {
        debug_assert_eq!(self.state, RecordingState::Opening);
        self.state = RecordingState::Failed;
    }

    /// Decides whether a sample may be written.
    ///
    /// The first accepted sample's timestamp anchors the session clock
    /// origin. Acceptance advances `last_written` for the track; equal
    /// timestamps are in order and accepted.
    pub fn offer_sample(&mut self, track: Track, pts: Duration) -> SampleDisposition {
        if self.state != RecordingState::Writing {
            return SampleDisposition::NotWriting;
        }
        if track == Track::Audio && !self.audio_enabled {
            return SampleDisposition::AudioDisabled;
        }

        let slot = track.index();
        if let Some(last) = self.last_written[slot] {
            if pts < last {
                self.stale_dropped[slot] += 1;
                return SampleDisposition::Stale;
            }
        }

        if self.clock_origin.is_none() {
            self.clock_origin = Some(pts);
        }
        self.last_written[slot] = Some(pts);
        self.accepted[slot] += 1;
        SampleDisposition::Accepted
    }

    /// `Writing -> Finishing`. `Idle` (or a terminal state) rejects with
    /// a not-recording error.
    pub fn begin_stop(&mut self) -> Result<(), CameraError> {
        if self.state != RecordingState::Writing {
            return Err(CameraError::NotRecording);
        }
        self.state = RecordingState::Finishing;
        self.end_time = match (self.last_written[0], self.last_written[1]) {
            (Some(v), Some(a)) => Some(v.max(a)),
            (v, a) => v.or(a),
        };
        Ok(())
    }

    /// `Finishing -> Completed`.
    pub fn finalize_ok(&mut self) {
        debug_assert_eq!(self.state, RecordingState::Finishing);
        self.state = RecordingState::Completed;
    }

    /// `Finishing -> Failed`.
    pub fn finalize_failed(&mut self) {
        debug_assert_eq!(self.state, RecordingState::Finishing);
        self.state = RecordingState::Failed;
    }

    /// Returns to `Idle` after the terminal outcome has been reported.
    pub fn reset(&mut self) {
        debug_assert!(matches!(
            self.state,
            RecordingState::Completed | RecordingState::Failed
        ));
        self.state = RecordingState::Idle;
    }

    /// Any state to `Idle`, used on session teardown. The partial output
    /// is the caller's to discard; no completion is owed.
    pub fn cancel(&mut self) {
        self.state = RecordingState::Idle;
    }

    /// Last timestamp written to a track during the current attempt.
    pub fn last_written(&self, track: Track) -> Option<Duration> {
        self.last_written[track.index()]
    }

    /// Stale samples dropped from a track during the current attempt.
    pub fn stale_dropped(&self, track: Track) -> u64 {
        self.stale_dropped[track.index()]
    }

    /// Samples accepted on a track during the current attempt.
    pub fn accepted(&self, track: Track) -> u64 {
        self.accepted[track.index()]
    }

    /// Recorded span between the clock origin and the session end time.
    pub fn recorded_duration(&self) -> Option<Duration> {
        match (self.clock_origin, self.end_time) {
            (Some(origin), Some(end)) => end.checked_sub(origin),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_initial_state_is_idle() {
        let machine = RecordingMachine::new();
        assert_eq!(machine.state(), RecordingState::Idle);
        assert!(!machine.is_active());
    }

    #[test]
    fn test_start_moves_to_opening_and_bumps_generation() {
        let mut machine = RecordingMachine::new();
        let gen = machine.begin_start(true).unwrap();
        assert_eq!(gen, 1);
        assert_eq!(machine.state(), RecordingState::Opening);
        assert!(machine.is_active());
    }

    #[test]
    fn test_second_start_is_concurrency_error() {
        let mut machine = RecordingMachine::new();
        machine.begin_start(true).unwrap();
        machine.sink_ready();

        let err = machine.begin_start(true).unwrap_err();
        assert!(matches!(err, CameraError::Concurrency { .. }));
        // The first attempt is unaffected
        assert_eq!(machine.state(), RecordingState::Writing);
        assert_eq!(machine.generation(), 1);
    }

    #[test]
    fn test_stop_while_idle_is_not_recording() {
        let mut machine = RecordingMachine::new();
        let err = machine.begin_stop().unwrap_err();
        assert!(matches!(err, CameraError::NotRecording));
        assert_eq!(machine.state(), RecordingState::Idle);
    }

    #[test]
    fn test_sink_rejected_fails_the_attempt() {
        let mut machine = RecordingMachine::new();
        machine.begin_start(true).unwrap();
        machine.sink_rejected();
        assert_eq!(machine.state(), RecordingState::Failed);
        machine.reset();
        assert_eq!(machine.state(), RecordingState::Idle);
        // A new attempt may start after the failure was reported
        assert_eq!(machine.begin_start(true).unwrap(), 2);
    }

    #[test]
    fn test_samples_rejected_outside_writing() {
        let mut machine = RecordingMachine::new();
        assert_eq!(
            machine.offer_sample(Track::Video, ms(0)),
            SampleDisposition::NotWriting
        );
        machine.begin_start(true).unwrap();
        assert_eq!(
            machine.offer_sample(Track::Video, ms(0)),
            SampleDisposition::NotWriting
        );
    }

    #[test]
    fn test_stale_sample_is_dropped_and_last_written_unchanged() {
        let mut machine = RecordingMachine::new();
        machine.begin_start(true).unwrap();
        machine.sink_ready();

        assert_eq!(
            machine.offer_sample(Track::Video, ms(5)),
            SampleDisposition::Accepted
        );
        assert_eq!(
            machine.offer_sample(Track::Video, ms(3)),
            SampleDisposition::Stale
        );
        assert_eq!(machine.last_written(Track::Video), Some(ms(5)));
        assert_eq!(machine.stale_dropped(Track::Video), 1);
    }

    #[test]
    fn test_equal_timestamp_is_accepted() {
        let mut machine = RecordingMachine::new();
        machine.begin_start(true).unwrap();
        machine.sink_ready();

        assert_eq!(
            machine.offer_sample(Track::Audio, ms(7)),
            SampleDisposition::Accepted
        );
        assert_eq!(
            machine.offer_sample(Track::Audio, ms(7)),
            SampleDisposition::Accepted
        );
        assert_eq!(machine.accepted(Track::Audio), 2);
    }

    #[test]
    fn test_tracks_order_independently() {
        let mut machine = RecordingMachine::new();
        machine.begin_start(true).unwrap();
        machine.sink_ready();

        machine.offer_sample(Track::Video, ms(10));
        // Audio behind video is fine - ordering is per track
        assert_eq!(
            machine.offer_sample(Track::Audio, ms(2)),
            SampleDisposition::Accepted
        );
    }

    #[test]
    fn test_out_of_order_scenario() {
        // start -> video ts [0,1,2,1,3] -> stop: 4 accepted, last = 3
        let mut machine = RecordingMachine::new();
        machine.begin_start(true).unwrap();
        machine.sink_ready();

        let verdicts: Vec<_> = [0u64, 1, 2, 1, 3]
            .iter()
            .map(|&t| machine.offer_sample(Track::Video, ms(t)))
            .collect();

        assert_eq!(
            verdicts,
            vec![
                SampleDisposition::Accepted,
                SampleDisposition::Accepted,
                SampleDisposition::Accepted,
                SampleDisposition::Stale,
                SampleDisposition::Accepted,
            ]
        );
        assert_eq!(machine.accepted(Track::Video), 4);
        assert_eq!(machine.last_written(Track::Video), Some(ms(3)));

        machine.begin_stop().unwrap();
        assert_eq!(machine.state(), RecordingState::Finishing);
    }

    #[test]
    fn test_audio_disabled_drops_audio_only() {
        let mut machine = RecordingMachine::new();
        machine.begin_start(false).unwrap();
        machine.sink_ready();

        assert_eq!(
            machine.offer_sample(Track::Audio, ms(0)),
            SampleDisposition::AudioDisabled
        );
        assert_eq!(
            machine.offer_sample(Track::Video, ms(0)),
            SampleDisposition::Accepted
        );
    }

    #[test]
    fn test_full_lifecycle_to_completed() {
        let mut machine = RecordingMachine::new();
        machine.begin_start(true).unwrap();
        machine.sink_ready();
        machine.offer_sample(Track::Video, ms(1));
        machine.offer_sample(Track::Video, ms(9));
        machine.begin_stop().unwrap();
        machine.finalize_ok();
        assert_eq!(machine.state(), RecordingState::Completed);
        assert_eq!(machine.recorded_duration(), Some(ms(8)));
        machine.reset();
        assert_eq!(machine.state(), RecordingState::Idle);
    }

    #[test]
    fn test_cancel_from_writing_returns_to_idle() {
        let mut machine = RecordingMachine::new();
        machine.begin_start(true).unwrap();
        machine.sink_ready();
        machine.offer_sample(Track::Video, ms(0));
        machine.cancel();
        assert_eq!(machine.state(), RecordingState::Idle);
        // And a fresh start works
        assert!(machine.begin_start(true).is_ok());
    }

    #[test]
    fn test_counters_reset_on_new_attempt() {
        let mut machine = RecordingMachine::new();
        machine.begin_start(true).unwrap();
        machine.sink_ready();
        machine.offer_sample(Track::Video, ms(5));
        machine.offer_sample(Track::Video, ms(1));
        assert_eq!(machine.stale_dropped(Track::Video), 1);
        machine.cancel();

        machine.begin_start(true).unwrap();
        assert_eq!(machine.stale_dropped(Track::Video), 0);
        assert_eq!(machine.last_written(Track::Video), None);
    }
}
