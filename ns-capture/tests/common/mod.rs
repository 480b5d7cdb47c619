//! In-process fakes for driving the assessment controller

#![allow(dead_code)]

use async_trait::async_trait;
use ns_capture::assembler::Blob;
use ns_capture::device::{
    FacingMode, MediaConstraints, MediaDevices, MediaStream, MediaTrack, PreviewSurface, TrackKind,
};
use ns_capture::error::{CaptureError, CaptureResult, DeviceError};
use ns_capture::recorder::{ChunkRecorder, RecorderEvent, RecorderEvents, RecorderFactory};
use ns_capture::upload::AssessmentApi;
use ns_capture::{AssessmentConfig, AssessmentTool, Collaborators};
use ns_common::api::UploadResponse;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

// ========================================
// Devices
// ========================================

#[derive(Default)]
pub struct FakeDevices {
    /// Platform error identifier to fail with
    pub fail_with: Mutex<Option<&'static str>>,
    pub requests: Mutex<Vec<FacingMode>>,
    pub issued: Mutex<Vec<MediaStream>>,
}

impl FakeDevices {
    pub fn failing(identifier: &'static str) -> Self {
        Self {
            fail_with: Mutex::new(Some(identifier)),
            ..Default::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn issued(&self) -> Vec<MediaStream> {
        self.issued.lock().unwrap().clone()
    }

    pub fn any_live(&self) -> bool {
        self.issued().iter().any(MediaStream::is_active)
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, DeviceError> {
        self.requests.lock().unwrap().push(constraints.facing_mode);

        if let Some(identifier) = *self.fail_with.lock().unwrap() {
            return Err(DeviceError::from_identifier(identifier, "fake device failure"));
        }

        let stream = MediaStream::new(vec![
            MediaTrack::new(
                TrackKind::Video,
                format!("{} camera", constraints.facing_mode),
                format!("cam-{}", constraints.facing_mode),
            ),
            MediaTrack::new(TrackKind::Audio, "microphone", "mic0"),
        ]);
        self.issued.lock().unwrap().push(stream.clone());
        Ok(stream)
    }
}

// ========================================
// Recorders
// ========================================

/// How fake recorders behave
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderScript {
    /// Emit nothing at all, not even on stop
    pub silent: bool,
    /// Stop on their own after this many fragments
    pub end_after: Option<u32>,
}

#[derive(Default)]
pub struct FakeRecorderFactory {
    pub script: RecorderScript,
    pub created: AtomicUsize,
}

impl FakeRecorderFactory {
    pub fn with_script(script: RecorderScript) -> Self {
        Self {
            script,
            created: AtomicUsize::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RecorderFactory for FakeRecorderFactory {
    fn create(
        &self,
        kind: TrackKind,
        _stream: MediaStream,
        events: RecorderEvents,
    ) -> CaptureResult<Box<dyn ChunkRecorder>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeRecorder {
            kind,
            events,
            script: self.script,
            stop: CancellationToken::new(),
        }))
    }
}

/// Emits `<kind>-<n>` every timeslice and `<kind>-final` when stopped
pub struct FakeRecorder {
    kind: TrackKind,
    events: RecorderEvents,
    script: RecorderScript,
    stop: CancellationToken,
}

#[async_trait]
impl ChunkRecorder for FakeRecorder {
    async fn start(&mut self, timeslice: Duration) -> CaptureResult<()> {
        let kind = self.kind;
        let events = self.events.clone();
        let script = self.script;
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + timeslice, timeslice);
            let mut emitted = 0u32;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        if script.silent {
                            continue;
                        }
                        emitted += 1;
                        let _ = events.send(RecorderEvent::Data(format!("{}-{}", kind, emitted).into_bytes()));
                        if script.end_after == Some(emitted) {
                            break;
                        }
                    }
                }
            }
            if !script.silent {
                let _ = events.send(RecorderEvent::Data(format!("{}-final", kind).into_bytes()));
            }
            let _ = events.send(RecorderEvent::Stopped);
        });
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<()> {
        self.stop.cancel();
        Ok(())
    }

    fn mime_type(&self) -> &str {
        match self.kind {
            TrackKind::Video => "video/webm",
            TrackKind::Audio => "audio/webm",
        }
    }
}

// ========================================
// Backend
// ========================================

#[derive(Debug, Clone, Copy)]
pub enum ApiReply {
    Success { risk_score: f64, risk_class: &'static str },
    Status(u16),
    /// Never answers
    Hang,
}

pub struct FakeApi {
    pub reply: ApiReply,
    pub uploads: Mutex<Vec<(Blob, Blob)>>,
}

impl FakeApi {
    pub fn new(reply: ApiReply) -> Self {
        Self {
            reply,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl AssessmentApi for FakeApi {
    async fn upload_assessment(&self, video: &Blob, audio: &Blob) -> CaptureResult<UploadResponse> {
        self.uploads
            .lock()
            .unwrap()
            .push((video.clone(), audio.clone()));

        match self.reply {
            ApiReply::Success {
                risk_score,
                risk_class,
            } => Ok(serde_json::from_value(json!({
                "message": "Assessment completed successfully",
                "session": {
                    "id": "session-1",
                    "userId": "user-1",
                    "riskScore": risk_score,
                    "modelVersion": "1.0.0",
                    "videoFeatures": [0.1, 0.2],
                    "audioFeatures": [0.3],
                    "fusionOutput": {"riskClass": risk_class},
                    "recordedAt": "2025-03-18T09:30:00Z"
                }
            }))
            .unwrap()),
            ApiReply::Status(status) => Err(CaptureError::ServerError {
                status,
                message: "Server error".to_string(),
            }),
            ApiReply::Hang => std::future::pending().await,
        }
    }
}

// ========================================
// Preview
// ========================================

#[derive(Default)]
pub struct FakePreview {
    pub attached: AtomicUsize,
    pub detached: AtomicUsize,
}

impl FakePreview {
    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn detached(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }
}

impl PreviewSurface for FakePreview {
    fn attach(&self, _stream: &MediaStream) {
        self.attached.fetch_add(1, Ordering::SeqCst);
    }

    fn detach(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }
}

// ========================================
// Harness
// ========================================

pub struct Harness {
    pub devices: Arc<FakeDevices>,
    pub recorders: Arc<FakeRecorderFactory>,
    pub api: Arc<FakeApi>,
    pub preview: Arc<FakePreview>,
}

impl Harness {
    pub fn new(devices: FakeDevices, recorders: FakeRecorderFactory, api: FakeApi) -> Self {
        Self {
            devices: Arc::new(devices),
            recorders: Arc::new(recorders),
            api: Arc::new(api),
            preview: Arc::new(FakePreview::default()),
        }
    }

    /// Working devices and recorders, backend answering with `reply`
    pub fn with_reply(reply: ApiReply) -> Self {
        Self::new(
            FakeDevices::default(),
            FakeRecorderFactory::default(),
            FakeApi::new(reply),
        )
    }

    pub fn low_risk() -> Self {
        Self::with_reply(ApiReply::Success {
            risk_score: 0.15,
            risk_class: "Low Risk",
        })
    }

    pub fn tool(&self) -> AssessmentTool {
        let deps = Collaborators {
            devices: self.devices.clone(),
            recorders: self.recorders.clone(),
            api: self.api.clone(),
            preview: self.preview.clone(),
        };
        AssessmentTool::new(deps, AssessmentConfig::default())
    }
}
