// Background removal adapter.
// The web layer only sees the `BackgroundRemover` trait; the ONNX-backed
// implementation is constructed once in `main` and injected through router state.

mod onnx;
mod u2net;

pub use onnx::OnnxRemover;
pub use u2net::ModelKind;

use std::{path::PathBuf, sync::Arc};

pub type SharedRemover = Arc<dyn BackgroundRemover>;

/// Errors produced while turning an image into its foreground cutout.
#[derive(Debug, thiserror::Error)]
pub enum RemovalError {
    #[error("failed to load model from {}: {}", .path.display(), .details)]
    ModelLoad { path: PathBuf, details: String },

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("failed to encode cutout: {0}")]
    Encode(#[source] image::ImageError),

    #[error("inference session lock was poisoned")]
    SessionPoisoned,
}

impl From<ort::Error> for RemovalError {
    fn from(err: ort::Error) -> Self {
        RemovalError::Inference(err.to_string())
    }
}

/// Removes the background of an encoded image.
///
/// Implementations take any buffer the `image` crate can decode and return a
/// PNG with the background made transparent. They are shared across request
/// tasks, so `remove_background` takes `&self` and must be safe to call
/// concurrently.
pub trait BackgroundRemover: Send + Sync {
    fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, RemovalError>;
}
