//! Outbound service clients

pub mod inference_client;

pub use inference_client::{FusionResult, InferenceClient, InferenceError, MediaFile};
