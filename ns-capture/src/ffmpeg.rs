//! ffmpeg-backed devices and recorders
//!
//! Each track is recorded by its own `ffmpeg` process writing WebM to stdout
//! (VP8 for video, Opus for audio). Output is buffered and emitted once per
//! timeslice. Stopping sends `q` on stdin so ffmpeg finalizes the container;
//! the remaining bytes are emitted before `Stopped`.
//!
//! Acquiring a stream runs a short throwaway capture from every device, so an
//! unusable camera or microphone is reported before any recorder starts.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::device::{FacingMode, MediaConstraints, MediaDevices, MediaStream, MediaTrack, TrackKind};
use crate::error::{CaptureError, CaptureResult, DeviceError, DeviceErrorKind};
use crate::recorder::{
    ChunkRecorder, RecorderEvent, RecorderEvents, RecorderFactory, AUDIO_MIME_TYPE, VIDEO_MIME_TYPE,
};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound for one trial capture
const TRIAL_CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Capture device configuration (`[ffmpeg]` in ns-capture.toml)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FfmpegSettings {
    pub ffmpeg_path: String,
    /// ffmpeg input format for cameras (v4l2, avfoundation, dshow)
    pub video_input_format: String,
    /// ffmpeg input format for microphones (alsa, avfoundation, dshow)
    pub audio_input_format: String,
    pub front_camera: String,
    pub back_camera: Option<String>,
    pub microphone: String,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        let (video_fmt, audio_fmt, camera, microphone) = if cfg!(target_os = "macos") {
            ("avfoundation", "avfoundation", "0", ":0")
        } else if cfg!(target_os = "windows") {
            ("dshow", "dshow", "video=Integrated Camera", "audio=Microphone")
        } else {
            ("v4l2", "alsa", "/dev/video0", "default")
        };

        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            video_input_format: video_fmt.to_string(),
            audio_input_format: audio_fmt.to_string(),
            front_camera: camera.to_string(),
            back_camera: None,
            microphone: microphone.to_string(),
        }
    }
}

impl FfmpegSettings {
    /// Device for the requested camera
    pub fn camera_for(&self, facing_mode: FacingMode) -> Result<&str, DeviceError> {
        match facing_mode {
            FacingMode::Front => Ok(&self.front_camera),
            FacingMode::Back => self.back_camera.as_deref().ok_or_else(|| {
                DeviceError::new(
                    DeviceErrorKind::ConstraintUnsatisfiable,
                    "no back camera configured",
                )
            }),
        }
    }

    fn input_format(&self, kind: TrackKind) -> &str {
        match kind {
            TrackKind::Video => &self.video_input_format,
            TrackKind::Audio => &self.audio_input_format,
        }
    }

    /// Arguments reading a tenth of a second from `device` and discarding it
    pub fn trial_capture_args(&self, kind: TrackKind, device: &str) -> Vec<String> {
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            self.input_format(kind),
            "-i",
            device,
            "-t",
            "0.1",
            "-f",
            "null",
            "-",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Arguments recording `device` to WebM on stdout
    pub fn recorder_args(&self, kind: TrackKind, device: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            self.input_format(kind),
            "-i",
            device,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let codec: &[&str] = match kind {
            TrackKind::Video => &["-an", "-c:v", "libvpx", "-deadline", "realtime", "-b:v", "1M"],
            TrackKind::Audio => &["-vn", "-c:a", "libopus", "-b:a", "96k"],
        };
        args.extend(codec.iter().map(|s| s.to_string()));
        args.extend(["-f", "webm", "pipe:1"].iter().map(|s| s.to_string()));
        args
    }
}

/// Devices addressed through ffmpeg input specifiers
pub struct FfmpegDevices {
    settings: Arc<FfmpegSettings>,
}

impl FfmpegDevices {
    pub fn new(settings: Arc<FfmpegSettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl MediaDevices for FfmpegDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, DeviceError> {
        let mut tracks = Vec::new();

        if constraints.video {
            let camera = self.settings.camera_for(constraints.facing_mode)?;
            check_device(camera).await?;
            trial_capture(&self.settings, TrackKind::Video, camera).await?;
            tracks.push(MediaTrack::new(
                TrackKind::Video,
                format!("{} camera", constraints.facing_mode),
                camera,
            ));
        }

        if constraints.audio {
            let microphone = &self.settings.microphone;
            check_device(microphone).await?;
            trial_capture(&self.settings, TrackKind::Audio, microphone).await?;
            tracks.push(MediaTrack::new(TrackKind::Audio, "microphone", microphone.as_str()));
        }

        debug!(tracks = tracks.len(), "Devices ready");
        Ok(MediaStream::new(tracks))
    }
}

/// Open path-like devices for read to surface permission and presence errors
async fn check_device(device: &str) -> Result<(), DeviceError> {
    if !Path::new(device).is_absolute() {
        return Ok(());
    }
    tokio::fs::File::open(device)
        .await
        .map(|_| ())
        .map_err(|e| DeviceError::from_io(&e, device))
}

/// Capture briefly from `device` through ffmpeg
///
/// A missing ffmpeg binary is reported through the spawn error; a failed
/// capture is classified from ffmpeg's stderr.
async fn trial_capture(
    settings: &FfmpegSettings,
    kind: TrackKind,
    device: &str,
) -> Result<(), DeviceError> {
    let child = Command::new(&settings.ffmpeg_path)
        .args(settings.trial_capture_args(kind, device))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            DeviceError::new(
                DeviceErrorKind::from_io(&e),
                format!("cannot run {}: {}", settings.ffmpeg_path, e),
            )
        })?;

    let output = match tokio::time::timeout(TRIAL_CAPTURE_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(DeviceError::from_io(&e, device)),
        Err(_) => {
            return Err(DeviceError::new(
                DeviceErrorKind::DeviceBusy,
                format!("{}: no response within {}s", device, TRIAL_CAPTURE_TIMEOUT.as_secs()),
            ))
        }
    };

    if output.status.success() {
        debug!(kind = %kind, device, "Trial capture succeeded");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let reason = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("ffmpeg exited with failure");
    warn!(kind = %kind, device, status = %output.status, reason, "Trial capture failed");

    Err(DeviceError::new(
        classify_stderr(&stderr),
        format!("{}: {}", device, reason),
    ))
}

/// Map ffmpeg's error output to a device failure kind
///
/// Unrecognized output is treated as a busy device.
pub fn classify_stderr(stderr: &str) -> DeviceErrorKind {
    const DENIED: &[&str] = &[
        "permission denied",
        "operation not permitted",
        "not authorized",
        "access denied",
    ];
    const BUSY: &[&str] = &["device or resource busy", "input/output error", "in use"];
    const MISSING: &[&str] = &[
        "no such file or directory",
        "no such device",
        "could not find",
        "invalid device index",
        "not found",
    ];
    const UNSUPPORTED: &[&str] = &["invalid argument", "not supported", "unsupported"];

    let text = stderr.to_ascii_lowercase();
    let matches = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if matches(DENIED) {
        DeviceErrorKind::PermissionDenied
    } else if matches(BUSY) {
        DeviceErrorKind::DeviceBusy
    } else if matches(MISSING) {
        DeviceErrorKind::DeviceNotFound
    } else if matches(UNSUPPORTED) {
        DeviceErrorKind::ConstraintUnsatisfiable
    } else {
        DeviceErrorKind::DeviceBusy
    }
}

/// Creates one [`FfmpegRecorder`] per track
pub struct FfmpegRecorderFactory {
    settings: Arc<FfmpegSettings>,
}

impl FfmpegRecorderFactory {
    pub fn new(settings: Arc<FfmpegSettings>) -> Self {
        Self { settings }
    }
}

impl RecorderFactory for FfmpegRecorderFactory {
    fn create(
        &self,
        kind: TrackKind,
        stream: MediaStream,
        events: RecorderEvents,
    ) -> CaptureResult<Box<dyn ChunkRecorder>> {
        let device = stream
            .tracks_of(kind)
            .next()
            .map(|t| t.device().to_string())
            .ok_or_else(|| CaptureError::Recorder(format!("stream has no {} track", kind)))?;

        Ok(Box::new(FfmpegRecorder {
            settings: Arc::clone(&self.settings),
            kind,
            device,
            events,
            stdin: None,
            pump: None,
        }))
    }
}

pub struct FfmpegRecorder {
    settings: Arc<FfmpegSettings>,
    kind: TrackKind,
    device: String,
    events: RecorderEvents,
    stdin: Option<ChildStdin>,
    pump: Option<JoinHandle<()>>,
}

#[async_trait]
impl ChunkRecorder for FfmpegRecorder {
    async fn start(&mut self, timeslice: Duration) -> CaptureResult<()> {
        if self.pump.is_some() {
            return Err(CaptureError::Recorder(format!("{} recorder already started", self.kind)));
        }

        let args = self.settings.recorder_args(self.kind, &self.device);
        debug!(kind = %self.kind, ffmpeg = %self.settings.ffmpeg_path, ?args, "Spawning recorder");

        let mut child = Command::new(&self.settings.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CaptureError::Recorder(format!("failed to start {}: {}", self.settings.ffmpeg_path, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Recorder("ffmpeg stdout unavailable".to_string()))?;
        self.stdin = child.stdin.take();

        self.pump = Some(tokio::spawn(pump(
            self.kind,
            child,
            stdout,
            timeslice,
            self.events.clone(),
        )));

        info!(kind = %self.kind, device = %self.device, "Recorder started");
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<()> {
        let Some(mut stdin) = self.stdin.take() else {
            return Ok(());
        };

        let sent = stdin.write_all(b"q").await;
        drop(stdin);
        sent.map_err(|e| CaptureError::Recorder(format!("{} stop request failed: {}", self.kind, e)))
    }

    fn mime_type(&self) -> &str {
        match self.kind {
            TrackKind::Video => VIDEO_MIME_TYPE,
            TrackKind::Audio => AUDIO_MIME_TYPE,
        }
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Forward ffmpeg output as one `Data` event per timeslice
async fn pump(
    kind: TrackKind,
    mut child: Child,
    mut stdout: ChildStdout,
    timeslice: Duration,
    events: RecorderEvents,
) {
    let mut ticker = interval_at(Instant::now() + timeslice, timeslice);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending = Vec::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    let _ = events.send(RecorderEvent::Error(e.to_string()));
                    break;
                }
            },
            _ = ticker.tick() => {
                if !pending.is_empty() {
                    let _ = events.send(RecorderEvent::Data(std::mem::take(&mut pending)));
                }
            }
        }
    }

    if !pending.is_empty() {
        let _ = events.send(RecorderEvent::Data(pending));
    }

    match child.wait().await {
        Ok(status) if !status.success() => {
            warn!(kind = %kind, %status, "ffmpeg exited with failure");
            let _ = events.send(RecorderEvent::Error(format!("ffmpeg exited with {}", status)));
        }
        Ok(_) => debug!(kind = %kind, "ffmpeg exited"),
        Err(e) => {
            let _ = events.send(RecorderEvent::Error(e.to_string()));
        }
    }

    let _ = events.send(RecorderEvent::Stopped);
}
