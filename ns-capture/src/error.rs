//! Error types for the capture pipeline
//!
//! Device errors are recoverable (the controller stays in Prep). Everything
//! that fails after recording starts sends the controller back to Intro with a
//! generic message.

use std::io;
use thiserror::Error;

use crate::assessment::Stage;

/// Message shown for any failure after recording has started
pub const PROCESSING_FAILED_MESSAGE: &str = "Failed to process your assessment. Please try again.";

/// Classified media-device failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    PermissionDenied,
    DeviceNotFound,
    DeviceBusy,
    ConstraintUnsatisfiable,
    InsecureContext,
}

impl DeviceErrorKind {
    /// Classify a platform error identifier
    ///
    /// Unknown identifiers are treated as a busy device.
    pub fn from_identifier(name: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => DeviceErrorKind::PermissionDenied,
            "NotFoundError" | "DevicesNotFoundError" => DeviceErrorKind::DeviceNotFound,
            "NotReadableError" | "TrackStartError" => DeviceErrorKind::DeviceBusy,
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                DeviceErrorKind::ConstraintUnsatisfiable
            }
            "SecurityError" | "TypeError" => DeviceErrorKind::InsecureContext,
            _ => DeviceErrorKind::DeviceBusy,
        }
    }

    /// Classify an I/O error from opening a device node
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => DeviceErrorKind::PermissionDenied,
            io::ErrorKind::NotFound => DeviceErrorKind::DeviceNotFound,
            io::ErrorKind::ResourceBusy => DeviceErrorKind::DeviceBusy,
            io::ErrorKind::InvalidInput => DeviceErrorKind::ConstraintUnsatisfiable,
            _ => DeviceErrorKind::DeviceBusy,
        }
    }

    /// User-facing explanation
    pub fn user_message(&self) -> &'static str {
        match self {
            DeviceErrorKind::PermissionDenied => {
                "Camera and microphone access was denied. Please allow access and try again."
            }
            DeviceErrorKind::DeviceNotFound => {
                "No camera or microphone was found. Please connect a device and try again."
            }
            DeviceErrorKind::DeviceBusy => {
                "Your camera or microphone is in use by another application. Close it and try again."
            }
            DeviceErrorKind::ConstraintUnsatisfiable => {
                "Your camera does not support the requested settings. Try switching cameras."
            }
            DeviceErrorKind::InsecureContext => {
                "Camera access is blocked in this context. Use a secure connection and try again."
            }
        }
    }
}

/// Media-device failure with the underlying detail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {detail}")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub detail: String,
}

impl DeviceError {
    pub fn new(kind: DeviceErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn from_identifier(name: &str, detail: impl Into<String>) -> Self {
        Self::new(DeviceErrorKind::from_identifier(name), detail)
    }

    pub fn from_io(err: &io::Error, device: &str) -> Self {
        Self::new(DeviceErrorKind::from_io(err), format!("{}: {}", device, err))
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

/// Capture pipeline errors
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Recording produced no data")]
    EmptyRecording,

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{operation} is not allowed in the {stage} stage")]
    InvalidStage {
        operation: &'static str,
        stage: Stage,
    },

    #[error("Cancelled")]
    Cancelled,

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// Terminal input could not be read
    #[error("Failed to read input: {0}")]
    Input(#[source] io::Error),
}

impl CaptureError {
    /// Message suitable for the session's `error` field
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::Device(e) => e.user_message().to_string(),
            CaptureError::Unauthorized(_) => "Please log in to continue.".to_string(),
            CaptureError::InvalidStage { .. }
            | CaptureError::Storage(_)
            | CaptureError::Input(_) => self.to_string(),
            _ => PROCESSING_FAILED_MESSAGE.to_string(),
        }
    }
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;
