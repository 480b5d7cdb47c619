//! # NeuroShield Capture Client
//!
//! Records a short camera and microphone clip, submits it to the backend and
//! interprets the returned risk score.
//!
//! **Pipeline:** device acquisition, dual recorder, progress clock, assembler,
//! upload, result interpretation. [`assessment::AssessmentTool`] drives it.

pub mod assembler;
pub mod assessment;
pub mod auth;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod ffmpeg;
pub mod history;
pub mod recorder;
pub mod upload;

pub use assessment::{AssessmentConfig, AssessmentTool, Collaborators, SessionSnapshot, Stage};
pub use error::{CaptureError, CaptureResult};
