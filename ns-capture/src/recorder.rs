//! Dual-stream chunked recording
//!
//! The combined device stream is split into a video-only and an audio-only
//! view and each view gets its own [`ChunkRecorder`]. Recorders push
//! [`RecorderEvent`]s into a channel; a collector task per track appends the
//! fragments in arrival order until the recorder reports `Stopped`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::device::{MediaStream, TrackKind};
use crate::error::{CaptureError, CaptureResult};

/// Interval between data fragments
pub const DEFAULT_TIMESLICE: Duration = Duration::from_secs(1);

/// How long to wait for a recorder's final data after a stop request
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

pub const VIDEO_MIME_TYPE: &str = "video/webm";
pub const AUDIO_MIME_TYPE: &str = "audio/webm";

/// Event emitted by a recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Encoded fragment (never empty)
    Data(Vec<u8>),
    /// Non-fatal recorder problem
    Error(String),
    /// Final event; all data has been delivered
    Stopped,
}

pub type RecorderEvents = mpsc::UnboundedSender<RecorderEvent>;

/// One single-track recorder
#[async_trait]
pub trait ChunkRecorder: Send {
    /// Start recording, emitting a `Data` event every `timeslice`
    async fn start(&mut self, timeslice: Duration) -> CaptureResult<()>;

    /// Ask the recorder to stop
    ///
    /// Returns once the request is sent. Remaining data and the `Stopped`
    /// event arrive afterwards on the event channel.
    async fn stop(&mut self) -> CaptureResult<()>;

    /// Media type of the produced fragments
    fn mime_type(&self) -> &str;
}

/// Creates recorders for single-track streams
pub trait RecorderFactory: Send + Sync {
    fn create(
        &self,
        kind: TrackKind,
        stream: MediaStream,
        events: RecorderEvents,
    ) -> CaptureResult<Box<dyn ChunkRecorder>>;
}

/// Fragments collected from both recorders, in arrival order
#[derive(Debug, Clone, Default)]
pub struct RecordedChunks {
    pub video: Vec<Vec<u8>>,
    pub audio: Vec<Vec<u8>>,
    pub video_mime: String,
    pub audio_mime: String,
}

struct TrackRecorder {
    kind: TrackKind,
    recorder: Box<dyn ChunkRecorder>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    count: Arc<AtomicUsize>,
    collector: JoinHandle<()>,
}

impl TrackRecorder {
    fn spawn(
        factory: &dyn RecorderFactory,
        kind: TrackKind,
        stream: MediaStream,
        ended: mpsc::UnboundedSender<TrackKind>,
    ) -> CaptureResult<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let recorder = factory.create(kind, stream, events_tx)?;

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        let collector = tokio::spawn(collect(
            kind,
            events_rx,
            Arc::clone(&chunks),
            Arc::clone(&count),
            ended,
        ));

        Ok(Self {
            kind,
            recorder,
            chunks,
            count,
            collector,
        })
    }

    /// Wait for the collector to see `Stopped`, then take the fragments
    async fn collect(&mut self, timeout: Duration) -> Vec<Vec<u8>> {
        if tokio::time::timeout(timeout, &mut self.collector)
            .await
            .is_err()
        {
            warn!(
                kind = %self.kind,
                "Recorder did not report stop within {:?}, using data received so far",
                timeout
            );
        }

        let mut chunks = self.chunks.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *chunks)
    }
}

impl Drop for TrackRecorder {
    fn drop(&mut self) {
        self.collector.abort();
    }
}

async fn collect(
    kind: TrackKind,
    mut events: mpsc::UnboundedReceiver<RecorderEvent>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    count: Arc<AtomicUsize>,
    ended: mpsc::UnboundedSender<TrackKind>,
) {
    while let Some(event) = events.recv().await {
        match event {
            RecorderEvent::Data(bytes) => {
                if bytes.is_empty() {
                    continue;
                }
                trace!(kind = %kind, bytes = bytes.len(), "Fragment received");
                chunks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(bytes);
                count.fetch_add(1, Ordering::SeqCst);
            }
            RecorderEvent::Error(message) => {
                warn!(kind = %kind, "Recorder error: {}", message);
            }
            RecorderEvent::Stopped => break,
        }
    }

    debug!(kind = %kind, fragments = count.load(Ordering::SeqCst), "Recorder stopped");
    let _ = ended.send(kind);
}

/// Video and audio recorders running side by side
pub struct DualRecorder {
    video: TrackRecorder,
    audio: TrackRecorder,
    ended_rx: mpsc::UnboundedReceiver<TrackKind>,
    stop_requested: bool,
}

impl DualRecorder {
    /// Split `stream` and start one recorder per track
    ///
    /// The stream must hold exactly one video and one audio track.
    pub async fn start(
        factory: &dyn RecorderFactory,
        stream: &MediaStream,
        timeslice: Duration,
    ) -> CaptureResult<Self> {
        let video_stream = single_track(stream, TrackKind::Video)?;
        let audio_stream = single_track(stream, TrackKind::Audio)?;

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let video = TrackRecorder::spawn(factory, TrackKind::Video, video_stream, ended_tx.clone())?;
        let audio = TrackRecorder::spawn(factory, TrackKind::Audio, audio_stream, ended_tx)?;

        let mut dual = Self {
            video,
            audio,
            ended_rx,
            stop_requested: false,
        };

        dual.video.recorder.start(timeslice).await?;
        if let Err(e) = dual.audio.recorder.start(timeslice).await {
            dual.request_stop().await;
            return Err(e);
        }

        info!(timeslice_ms = timeslice.as_millis() as u64, "Recording started");
        Ok(dual)
    }

    /// Fragments received so far: (video, audio)
    pub fn chunk_counts(&self) -> (usize, usize) {
        (
            self.video.count.load(Ordering::SeqCst),
            self.audio.count.load(Ordering::SeqCst),
        )
    }

    /// Resolves when either recorder has stopped
    ///
    /// Never resolves if both have already been reported.
    pub async fn ended(&mut self) -> TrackKind {
        match self.ended_rx.recv().await {
            Some(kind) => kind,
            None => std::future::pending().await,
        }
    }

    /// Send a stop request to both recorders (once)
    pub async fn request_stop(&mut self) {
        if self.stop_requested {
            return;
        }
        self.stop_requested = true;

        for track in [&mut self.video, &mut self.audio] {
            if let Err(e) = track.recorder.stop().await {
                warn!(kind = %track.kind, error = %e, "Failed to stop recorder");
            }
        }
    }

    /// Stop both recorders and wait for their final data
    pub async fn finish(mut self, stop_timeout: Duration) -> RecordedChunks {
        self.request_stop().await;

        let video = self.video.collect(stop_timeout).await;
        let audio = self.audio.collect(stop_timeout).await;

        info!(
            video_fragments = video.len(),
            audio_fragments = audio.len(),
            "Recording finished"
        );

        RecordedChunks {
            video,
            audio,
            video_mime: self.video.recorder.mime_type().to_string(),
            audio_mime: self.audio.recorder.mime_type().to_string(),
        }
    }

    /// Stop both recorders and discard their data
    pub async fn abort(mut self) {
        self.request_stop().await;
        debug!("Recording aborted");
    }
}

fn single_track(stream: &MediaStream, kind: TrackKind) -> CaptureResult<MediaStream> {
    let view = match kind {
        TrackKind::Video => stream.video_only(),
        TrackKind::Audio => stream.audio_only(),
    };
    match view.tracks().len() {
        1 => Ok(view),
        n => Err(CaptureError::Recorder(format!(
            "expected exactly one {} track, found {}",
            kind, n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MediaTrack;

    /// Delivers its scripted fragments when stopped
    struct ScriptedRecorder {
        events: RecorderEvents,
        fragments: Vec<Vec<u8>>,
    }

    #[async_trait]
    impl ChunkRecorder for ScriptedRecorder {
        async fn start(&mut self, _timeslice: Duration) -> CaptureResult<()> {
            Ok(())
        }

        async fn stop(&mut self) -> CaptureResult<()> {
            for fragment in self.fragments.drain(..) {
                let _ = self.events.send(RecorderEvent::Data(fragment));
            }
            let _ = self.events.send(RecorderEvent::Stopped);
            Ok(())
        }

        fn mime_type(&self) -> &str {
            "test/webm"
        }
    }

    struct ScriptedFactory {
        fragments: Vec<Vec<u8>>,
    }

    impl RecorderFactory for ScriptedFactory {
        fn create(
            &self,
            _kind: TrackKind,
            _stream: MediaStream,
            events: RecorderEvents,
        ) -> CaptureResult<Box<dyn ChunkRecorder>> {
            Ok(Box::new(ScriptedRecorder {
                events,
                fragments: self.fragments.clone(),
            }))
        }
    }

    fn av_stream() -> MediaStream {
        MediaStream::new(vec![
            MediaTrack::new(TrackKind::Video, "camera", "cam0"),
            MediaTrack::new(TrackKind::Audio, "mic", "mic0"),
        ])
    }

    #[tokio::test]
    async fn test_fragments_kept_in_order_and_empty_skipped() {
        let factory = ScriptedFactory {
            fragments: vec![b"a".to_vec(), Vec::new(), b"b".to_vec()],
        };
        let dual = DualRecorder::start(&factory, &av_stream(), DEFAULT_TIMESLICE)
            .await
            .unwrap();

        let chunks = dual.finish(DEFAULT_STOP_TIMEOUT).await;
        assert_eq!(chunks.video, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(chunks.audio, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(chunks.video_mime, "test/webm");
    }

    #[tokio::test]
    async fn test_stop_before_data_gives_empty_chunks() {
        let factory = ScriptedFactory { fragments: vec![] };
        let dual = DualRecorder::start(&factory, &av_stream(), DEFAULT_TIMESLICE)
            .await
            .unwrap();

        let chunks = dual.finish(DEFAULT_STOP_TIMEOUT).await;
        assert!(chunks.video.is_empty());
        assert!(chunks.audio.is_empty());
    }

    #[tokio::test]
    async fn test_stream_without_audio_rejected() {
        let factory = ScriptedFactory { fragments: vec![] };
        let video_only = av_stream().video_only();

        let result = DualRecorder::start(&factory, &video_only, DEFAULT_TIMESLICE).await;
        assert!(matches!(result, Err(CaptureError::Recorder(_))));
    }
}
