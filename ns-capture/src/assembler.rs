//! Concatenates recorded fragments into uploadable blobs

use crate::error::{CaptureError, CaptureResult};
use crate::recorder::RecordedChunks;

/// Binary payload tagged with its media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl Blob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Concatenate fragments in order
    pub fn from_chunks(chunks: &[Vec<u8>], mime_type: impl Into<String>) -> Self {
        Self::new(chunks.concat(), mime_type)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The two blobs sent to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledRecording {
    pub video: Blob,
    pub audio: Blob,
}

/// Build both blobs; fails with `EmptyRecording` if either has no data
pub fn assemble(chunks: &RecordedChunks) -> CaptureResult<AssembledRecording> {
    let video = Blob::from_chunks(&chunks.video, chunks.video_mime.clone());
    let audio = Blob::from_chunks(&chunks.audio, chunks.audio_mime.clone());

    if video.is_empty() || audio.is_empty() {
        return Err(CaptureError::EmptyRecording);
    }

    Ok(AssembledRecording { video, audio })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(video: &[&[u8]], audio: &[&[u8]]) -> RecordedChunks {
        RecordedChunks {
            video: video.iter().map(|c| c.to_vec()).collect(),
            audio: audio.iter().map(|c| c.to_vec()).collect(),
            video_mime: "video/webm".to_string(),
            audio_mime: "audio/webm".to_string(),
        }
    }

    #[test]
    fn test_concatenates_in_order() {
        let assembled = assemble(&chunks(&[b"ab", b"cd"], &[b"xy"])).unwrap();
        assert_eq!(assembled.video.data, b"abcd");
        assert_eq!(assembled.video.mime_type, "video/webm");
        assert_eq!(assembled.audio.data, b"xy");
        assert_eq!(assembled.audio.mime_type, "audio/webm");
    }

    #[test]
    fn test_missing_stream_is_empty_recording() {
        assert!(matches!(
            assemble(&chunks(&[], &[])),
            Err(CaptureError::EmptyRecording)
        ));
        assert!(matches!(
            assemble(&chunks(&[b"video"], &[])),
            Err(CaptureError::EmptyRecording)
        ));
    }
}
