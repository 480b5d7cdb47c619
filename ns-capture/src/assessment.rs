//! Assessment controller
//!
//! Drives one capture session through
//! `Intro -> Prep -> Recording -> Processing -> Results` and back to `Intro`.
//!
//! - Device failures keep the session in Prep with a device-specific message.
//! - Any failure after recording starts returns to Intro with the generic
//!   processing message and cleared chunks.
//! - The device stream is released on every exit from Recording, on
//!   teardown, and on drop.
//!
//! State is published as [`SessionSnapshot`]s on a watch channel. Timers,
//! recorder flushes and the upload all watch one [`CancellationToken`] that
//! [`AssessmentTool::teardown`] cancels.

use ns_common::risk::AssessmentResult;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler::assemble;
use crate::clock::{ProgressClock, DEFAULT_TICK_INTERVAL, DEFAULT_TOTAL_TICKS};
use crate::device::{FacingMode, MediaConstraints, MediaDevices, MediaStream, PreviewSurface};
use crate::error::{CaptureError, CaptureResult};
use crate::recorder::{
    DualRecorder, RecordedChunks, RecorderFactory, DEFAULT_STOP_TIMEOUT, DEFAULT_TIMESLICE,
};
use crate::upload::{interpret_upload, AssessmentApi};

/// Controller stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Intro,
    Prep,
    Recording,
    Processing,
    Results,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Intro => "Intro",
            Stage::Prep => "Prep",
            Stage::Recording => "Recording",
            Stage::Processing => "Processing",
            Stage::Results => "Results",
        };
        f.write_str(name)
    }
}

/// Read-only view of the session for front ends
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub stage: Stage,
    /// 0 to 100, non-decreasing within one recording
    pub progress: f64,
    /// 3, 2, 1 during the pre-recording countdown
    pub countdown: Option<u32>,
    pub facing_mode: FacingMode,
    pub error: Option<String>,
    pub result: Option<AssessmentResult>,
    pub video_chunks: usize,
    pub audio_chunks: usize,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            stage: Stage::Intro,
            progress: 0.0,
            countdown: None,
            facing_mode: FacingMode::default(),
            error: None,
            result: None,
            video_chunks: 0,
            audio_chunks: 0,
        }
    }
}

/// Timing of one assessment
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    pub recording_ticks: u32,
    pub tick_interval: Duration,
    /// First countdown value; counts down to 1
    pub countdown_from: u32,
    pub countdown_interval: Duration,
    pub timeslice: Duration,
    /// Pause between the stop request and Processing
    pub settle_delay: Duration,
    pub stop_timeout: Duration,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            recording_ticks: DEFAULT_TOTAL_TICKS,
            tick_interval: DEFAULT_TICK_INTERVAL,
            countdown_from: 3,
            countdown_interval: Duration::from_secs(1),
            timeslice: DEFAULT_TIMESLICE,
            settle_delay: Duration::from_millis(1000),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// Collaborators the controller drives
#[derive(Clone)]
pub struct Collaborators {
    pub devices: Arc<dyn MediaDevices>,
    pub recorders: Arc<dyn RecorderFactory>,
    pub api: Arc<dyn AssessmentApi>,
    pub preview: Arc<dyn PreviewSurface>,
}

pub struct AssessmentTool {
    deps: Collaborators,
    config: AssessmentConfig,
    session: SessionSnapshot,
    chunks: RecordedChunks,
    stream: Option<MediaStream>,
    cancel: CancellationToken,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl AssessmentTool {
    pub fn new(deps: Collaborators, config: AssessmentConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            deps,
            config,
            session: SessionSnapshot::default(),
            chunks: RecordedChunks::default(),
            stream: None,
            cancel: CancellationToken::new(),
            state_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.clone()
    }

    pub fn stage(&self) -> Stage {
        self.session.stage
    }

    /// Token that aborts whatever the controller is waiting on
    ///
    /// Cancelling it has the same effect on in-flight work as
    /// [`teardown`](Self::teardown); call `teardown` afterwards to reset.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn has_live_stream(&self) -> bool {
        self.stream.as_ref().is_some_and(MediaStream::is_active)
    }

    /// Leave Intro and acquire the camera and microphone
    ///
    /// On a device failure the session stays in Prep with the error set.
    pub async fn begin(&mut self) -> CaptureResult<()> {
        self.require_stage("begin", Stage::Intro)?;

        self.session.stage = Stage::Prep;
        self.session.error = None;
        self.session.result = None;
        self.session.progress = 0.0;
        self.publish();
        info!("Entered Prep");

        self.acquire_stream().await
    }

    /// Retry device acquisition in Prep
    pub async fn prepare(&mut self) -> CaptureResult<()> {
        self.require_stage("prepare", Stage::Prep)?;
        self.acquire_stream().await
    }

    /// Switch between front and back camera
    ///
    /// The old tracks are stopped before the new stream is requested.
    pub async fn toggle_camera(&mut self) -> CaptureResult<()> {
        self.require_stage("toggle_camera", Stage::Prep)?;

        self.session.facing_mode = self.session.facing_mode.toggled();
        info!(facing_mode = %self.session.facing_mode, "Switching camera");
        self.acquire_stream().await
    }

    /// Count down, record, then submit
    ///
    /// Returns the interpreted result (the session is then in Results). Any
    /// failure after the countdown leaves the session in Intro.
    pub async fn start_recording(&mut self) -> CaptureResult<AssessmentResult> {
        self.require_stage("start_recording", Stage::Prep)?;
        if !self.has_live_stream() {
            self.acquire_stream().await?;
        }

        self.run_countdown().await?;

        let outcome = self.capture_and_submit().await;
        self.release_stream();

        match outcome {
            Ok(result) => {
                self.session.stage = Stage::Results;
                self.session.result = Some(result.clone());
                self.session.error = None;
                self.publish();
                info!(
                    risk_score = result.risk_score,
                    risk_class = %result.risk_class,
                    "Assessment complete"
                );
                Ok(result)
            }
            Err(e) => {
                self.return_to_intro();
                if !matches!(e, CaptureError::Cancelled) {
                    warn!(error = %e, "Assessment failed");
                    self.session.error = Some(e.user_message());
                }
                self.publish();
                Err(e)
            }
        }
    }

    /// Go back to Intro from Results
    pub fn restart(&mut self) -> CaptureResult<()> {
        self.require_stage("restart", Stage::Results)?;
        self.return_to_intro();
        self.publish();
        debug!("Restarted");
        Ok(())
    }

    /// Cancel pending work, release devices and reset to Intro
    ///
    /// The facing mode is kept. The controller is usable again afterwards.
    pub fn teardown(&mut self) {
        self.cancel.cancel();
        self.release_stream();
        self.return_to_intro();
        self.session.error = None;
        self.cancel = CancellationToken::new();
        self.publish();
        info!("Assessment torn down");
    }

    fn require_stage(&self, operation: &'static str, expected: Stage) -> CaptureResult<()> {
        if self.session.stage == expected {
            Ok(())
        } else {
            Err(CaptureError::InvalidStage {
                operation,
                stage: self.session.stage,
            })
        }
    }

    async fn acquire_stream(&mut self) -> CaptureResult<()> {
        self.release_stream();

        let constraints = MediaConstraints::camera_and_microphone(self.session.facing_mode);
        let devices = Arc::clone(&self.deps.devices);
        let cancel = self.cancel.clone();

        let acquired = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CaptureError::Cancelled),
            result = devices.get_user_media(&constraints) => result,
        };

        match acquired {
            Ok(stream) => {
                self.deps.preview.attach(&stream);
                info!(
                    facing_mode = %constraints.facing_mode,
                    tracks = stream.tracks().len(),
                    "Media stream acquired"
                );
                self.stream = Some(stream);
                self.session.error = None;
                self.publish();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Media acquisition failed");
                self.session.error = Some(e.user_message().to_string());
                self.publish();
                Err(e.into())
            }
        }
    }

    async fn run_countdown(&mut self) -> CaptureResult<()> {
        let cancel = self.cancel.clone();
        for value in (1..=self.config.countdown_from).rev() {
            self.session.countdown = Some(value);
            self.publish();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.session.countdown = None;
                    self.publish();
                    return Err(CaptureError::Cancelled);
                }
                _ = tokio::time::sleep(self.config.countdown_interval) => {}
            }
        }
        self.session.countdown = None;
        Ok(())
    }

    async fn capture_and_submit(&mut self) -> CaptureResult<AssessmentResult> {
        let cancel = self.cancel.clone();
        let stream = self
            .stream
            .clone()
            .ok_or_else(|| CaptureError::Recorder("no media stream".to_string()))?;

        self.chunks = RecordedChunks::default();
        self.session.stage = Stage::Recording;
        self.session.progress = 0.0;
        self.session.error = None;
        self.set_chunk_counts(0, 0);
        self.publish();

        let mut recorder =
            DualRecorder::start(self.deps.recorders.as_ref(), &stream, self.config.timeslice)
                .await?;
        let mut clock = ProgressClock::new(self.config.recording_ticks, self.config.tick_interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    clock.stop();
                    recorder.abort().await;
                    return Err(CaptureError::Cancelled);
                }
                kind = recorder.ended() => {
                    warn!(kind = %kind, ticks = clock.ticks(), "Recorder stopped before the clock completed");
                    clock.stop();
                    break;
                }
                tick = clock.next_tick() => match tick {
                    Some(progress) => {
                        let (video, audio) = recorder.chunk_counts();
                        self.session.progress = progress;
                        self.set_chunk_counts(video, audio);
                        self.publish();
                        if clock.is_complete() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        recorder.request_stop().await;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                recorder.abort().await;
                return Err(CaptureError::Cancelled);
            }
            _ = tokio::time::sleep(self.config.settle_delay) => {}
        }

        self.session.stage = Stage::Processing;
        self.publish();
        info!("Processing recording");

        let stop_timeout = self.config.stop_timeout;
        let chunks = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CaptureError::Cancelled),
            chunks = recorder.finish(stop_timeout) => chunks,
        };
        self.set_chunk_counts(chunks.video.len(), chunks.audio.len());
        self.chunks = chunks;
        self.publish();

        let recording = assemble(&self.chunks)?;
        let api = Arc::clone(&self.deps.api);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CaptureError::Cancelled),
            response = api.upload_assessment(&recording.video, &recording.audio) => response?,
        };

        Ok(interpret_upload(&response))
    }

    fn return_to_intro(&mut self) {
        self.session.stage = Stage::Intro;
        self.session.progress = 0.0;
        self.session.countdown = None;
        self.session.result = None;
        self.chunks = RecordedChunks::default();
        self.set_chunk_counts(0, 0);
    }

    fn set_chunk_counts(&mut self, video: usize, audio: usize) {
        self.session.video_chunks = video;
        self.session.audio_chunks = audio;
    }

    fn release_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            self.deps.preview.detach();
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.session.clone());
    }
}

impl Drop for AssessmentTool {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.release_stream();
    }
}
