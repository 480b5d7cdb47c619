//! Media device layer
//!
//! A [`MediaStream`] is a set of live tracks obtained from [`MediaDevices`].
//! Tracks are cheap handles: clones share one live flag, so stopping the
//! combined stream also stops the video-only and audio-only views derived
//! from it.

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::DeviceError;

/// Track media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// Which camera to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FacingMode {
    /// User-facing camera
    #[default]
    Front,
    /// Environment-facing camera
    Back,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::Front => FacingMode::Back,
            FacingMode::Back => FacingMode::Front,
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingMode::Front => write!(f, "front"),
            FacingMode::Back => write!(f, "back"),
        }
    }
}

/// What to request from the devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub facing_mode: FacingMode,
    pub video: bool,
    pub audio: bool,
}

impl MediaConstraints {
    /// Camera with the given facing mode plus microphone
    pub fn camera_and_microphone(facing_mode: FacingMode) -> Self {
        Self {
            facing_mode,
            video: true,
            audio: true,
        }
    }
}

/// One live capture track
#[derive(Debug, Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    label: String,
    device: String,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            device: device.into(),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Platform device identifier (device node, index, or name)
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Stop the track; returns false if it was already stopped
    pub fn stop(&self) -> bool {
        let was_live = self.live.swap(false, Ordering::SeqCst);
        if was_live {
            debug!(kind = %self.kind, device = %self.device, "Track stopped");
        }
        was_live
    }
}

/// A set of tracks acquired together
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    /// View holding only the video tracks
    pub fn video_only(&self) -> MediaStream {
        self.only(TrackKind::Video)
    }

    /// View holding only the audio tracks
    pub fn audio_only(&self) -> MediaStream {
        self.only(TrackKind::Audio)
    }

    fn only(&self, kind: TrackKind) -> MediaStream {
        MediaStream::new(self.tracks_of(kind).cloned().collect())
    }

    /// True while any track is live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stop every track (idempotent)
    pub fn stop(&self) {
        let stopped = self.tracks.iter().filter(|t| t.stop()).count();
        if stopped > 0 {
            info!(tracks = stopped, "Released media stream");
        }
    }
}

/// Source of camera/microphone streams
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, DeviceError>;
}

/// Where the live preview is shown
pub trait PreviewSurface: Send + Sync {
    fn attach(&self, stream: &MediaStream);
    fn detach(&self);
}

/// Preview that only logs attach/detach
#[derive(Debug, Default)]
pub struct LogPreview;

impl PreviewSurface for LogPreview {
    fn attach(&self, stream: &MediaStream) {
        for track in stream.tracks_of(TrackKind::Video) {
            info!(label = %track.label(), device = %track.device(), "Preview attached");
        }
    }

    fn detach(&self) {
        debug!("Preview detached");
    }
}
