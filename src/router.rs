//! The frame router: fan-out point between capture and its consumers.
//!
//! One task receives every sample from the backend and forwards it to up to
//! three places:
//!
//! - the **preview slot**, a watch channel holding only the newest video
//!   frame (overwrite, never queue)
//! - the **recorder**, when the gate says a recording is accepting the
//!   sample's track; forwarding is non-blocking, a full channel drops
//! - the **analysis tap**, fed one in every N video frames so per-frame
//!   analysis cannot starve the preview path
//!
//! The capture producer is never blocked by a slow consumer: the router
//! only performs `try_send` and watch replacement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::RouterConfig;
use crate::recording::{RecorderCommand, RecorderGate};
use crate::sample::{Dimensions, PreviewFrame, Sample, Track};

/// Counters published by the router task.
#[derive(Debug, Default)]
pub struct RouterStats {
    video_seen: AtomicU64,
    audio_seen: AtomicU64,
    analysis_forwarded: AtomicU64,
    analysis_dropped: AtomicU64,
}

impl RouterStats {
    /// Video samples that entered the router.
    pub fn video_seen(&self) -> u64 {
        self.video_seen.load(Ordering::Relaxed)
    }

    /// Audio samples that entered the router.
    pub fn audio_seen(&self) -> u64 {
        self.audio_seen.load(Ordering::Relaxed)
    }

    /// Frames handed to the analysis tap.
    pub fn analysis_forwarded(&self) -> u64 {
        self.analysis_forwarded.load(Ordering::Relaxed)
    }

    /// Frames due for analysis that were dropped because the tap was full.
    pub fn analysis_dropped(&self) -> u64 {
        self.analysis_dropped.load(Ordering::Relaxed)
    }
}

pub(crate) struct FrameRouter {
    sample_rx: mpsc::Receiver<Sample>,
    preview_tx: watch::Sender<Option<PreviewFrame>>,
    analysis_tx: Option<mpsc::Sender<Sample>>,
    recorder_tx: mpsc::Sender<RecorderCommand>,
    gate: Arc<RecorderGate>,
    stats: Arc<RouterStats>,
    fallback_dimensions: Dimensions,
    analysis_divisor: u64,
}

impl FrameRouter {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        config: &RouterConfig,
        sample_rx: mpsc::Receiver<Sample>,
        preview_tx: watch::Sender<Option<PreviewFrame>>,
        analysis_tx: Option<mpsc::Sender<Sample>>,
        recorder_tx: mpsc::Sender<RecorderCommand>,
        gate: Arc<RecorderGate>,
        stats: Arc<RouterStats>,
        fallback_dimensions: Dimensions,
    ) -> JoinHandle<()> {
        let router = Self {
            sample_rx,
            preview_tx,
            analysis_tx,
            recorder_tx,
            gate,
            stats,
            fallback_dimensions,
            analysis_divisor: config.analysis_divisor.max(1),
        };
        tokio::spawn(router.run())
    }

    async fn run(mut self) {
        tracing::debug!("frame router started");

        while let Some(sample) = self.sample_rx.recv().await {
            self.route(sample);
        }

        // Producer gone: clear the preview so late subscribers don't see a
        // frame from a dead session.
        self.preview_tx.send_replace(None);
        tracing::debug!(
            video = self.stats.video_seen(),
            audio = self.stats.audio_seen(),
            "frame router stopped"
        );
    }

    fn route(&mut self, sample: Sample) {
        if sample.track == Track::Video {
            let seen = self.stats.video_seen.fetch_add(1, Ordering::Relaxed);

            if let Some(frame) = PreviewFrame::from_sample(&sample, self.fallback_dimensions) {
                self.preview_tx.send_replace(Some(frame));
            }

            if seen % self.analysis_divisor == 0 {
                if let Some(ref tx) = self.analysis_tx {
                    match tx.try_send(sample.clone()) {
                        Ok(()) => {
                            self.stats.analysis_forwarded.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            self.stats.analysis_dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
        } else {
            self.stats.audio_seen.fetch_add(1, Ordering::Relaxed);
        }

        if self.gate.is_writing() && self.gate.ready(sample.track) {
            if self
                .recorder_tx
                .try_send(RecorderCommand::Sample(sample))
                .is_err()
            {
                self.gate.record_overflow();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Fixture {
        sample_tx: mpsc::Sender<Sample>,
        preview_rx: watch::Receiver<Option<PreviewFrame>>,
        analysis_rx: mpsc::Receiver<Sample>,
        recorder_rx: mpsc::Receiver<RecorderCommand>,
        gate: Arc<RecorderGate>,
        stats: Arc<RouterStats>,
        handle: JoinHandle<()>,
    }

    fn fixture(divisor: u64) -> Fixture {
        let config = RouterConfig {
            analysis_divisor: divisor,
            ..Default::default()
        };
        let (sample_tx, sample_rx) = mpsc::channel(64);
        let (preview_tx, preview_rx) = watch::channel(None);
        let (analysis_tx, analysis_rx) = mpsc::channel(64);
        let (recorder_tx, recorder_rx) = mpsc::channel(64);
        let gate = Arc::new(RecorderGate::new());
        let stats = Arc::new(RouterStats::default());

        let handle = FrameRouter::spawn(
            &config,
            sample_rx,
            preview_tx,
            Some(analysis_tx),
            recorder_tx,
            Arc::clone(&gate),
            Arc::clone(&stats),
            Dimensions::new(640, 480),
        );

        Fixture {
            sample_tx,
            preview_rx,
            analysis_rx,
            recorder_rx,
            gate,
            stats,
            handle,
        }
    }

    fn video(pts_ms: u64) -> Sample {
        Sample::video(
            Duration::from_millis(pts_ms),
            vec![pts_ms as u8; 4],
            Dimensions::new(2, 2),
        )
    }

    #[tokio::test]
    async fn test_preview_holds_only_latest_frame() {
        let mut fx = fixture(10);

        for pts in 0..5 {
            fx.sample_tx.send(video(pts)).await.unwrap();
        }
        drop(fx.sample_tx);
        fx.handle.await.unwrap();

        // All frames were processed; the slot saw replacements, and after
        // shutdown it is cleared.
        assert_eq!(fx.stats.video_seen(), 5);
        assert!(fx.preview_rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_preview_publishes_frames() {
        let fx = fixture(10);

        fx.sample_tx.send(video(7)).await.unwrap();

        let mut preview_rx = fx.preview_rx.clone();
        preview_rx.changed().await.unwrap();
        let frame = preview_rx.borrow().clone().unwrap();
        assert_eq!(frame.data.as_ref(), &vec![7u8; 4]);
    }

    #[tokio::test]
    async fn test_analysis_tap_gets_one_in_n() {
        let mut fx = fixture(10);

        for pts in 0..20 {
            fx.sample_tx.send(video(pts)).await.unwrap();
        }
        drop(fx.sample_tx);
        fx.handle.await.unwrap();

        assert_eq!(fx.stats.analysis_forwarded(), 2);
        let first = fx.analysis_rx.recv().await.unwrap();
        assert_eq!(first.pts, Duration::from_millis(0));
        let second = fx.analysis_rx.recv().await.unwrap();
        assert_eq!(second.pts, Duration::from_millis(10));
        assert!(fx.analysis_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_audio_skips_preview_and_analysis() {
        let mut fx = fixture(1);

        fx.sample_tx
            .send(Sample::audio(Duration::ZERO, vec![0; 8]))
            .await
            .unwrap();
        drop(fx.sample_tx);
        fx.handle.await.unwrap();

        assert_eq!(fx.stats.audio_seen(), 1);
        assert_eq!(fx.stats.analysis_forwarded(), 0);
        assert!(fx.analysis_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_recorder_sees_nothing_while_gate_closed() {
        let mut fx = fixture(10);

        fx.sample_tx.send(video(0)).await.unwrap();
        drop(fx.sample_tx);
        fx.handle.await.unwrap();

        assert!(fx.recorder_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recorder_receives_when_gate_open() {
        let mut fx = fixture(10);
        fx.gate.set_writing(true);
        fx.gate.set_ready(Track::Video, true);

        fx.sample_tx.send(video(3)).await.unwrap();
        fx.sample_tx
            .send(Sample::audio(Duration::from_millis(4), vec![0]))
            .await
            .unwrap();
        drop(fx.sample_tx);
        fx.handle.await.unwrap();

        // Video forwarded; audio track was not ready so it was dropped
        match fx.recorder_rx.recv().await.unwrap() {
            RecorderCommand::Sample(sample) => {
                assert_eq!(sample.track, Track::Video);
                assert_eq!(sample.pts, Duration::from_millis(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(fx.recorder_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_recorder_channel_drops_instead_of_blocking() {
        let config = RouterConfig {
            analysis_divisor: 10,
            ..Default::default()
        };
        let (sample_tx, sample_rx) = mpsc::channel(64);
        let (preview_tx, _preview_rx) = watch::channel(None);
        // Capacity 1 and nobody draining: the second forward must drop
        let (recorder_tx, _recorder_rx) = mpsc::channel(1);
        let gate = Arc::new(RecorderGate::new());
        let stats = Arc::new(RouterStats::default());
        gate.set_writing(true);
        gate.set_ready(Track::Video, true);

        let handle = FrameRouter::spawn(
            &config,
            sample_rx,
            preview_tx,
            None,
            recorder_tx,
            Arc::clone(&gate),
            stats,
            Dimensions::new(640, 480),
        );

        sample_tx.send(video(0)).await.unwrap();
        sample_tx.send(video(1)).await.unwrap();
        sample_tx.send(video(2)).await.unwrap();
        drop(sample_tx);
        handle.await.unwrap();

        assert_eq!(gate.overflow_dropped(), 2);
    }
}
