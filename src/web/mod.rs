// Web server module
// Handles the upload page and the background removal endpoint

mod app;
mod error;
mod extract_request_data;
mod handlers;
mod image_codec;
mod listeners;
mod models;

pub use app::create_app;
pub use listeners::create_listener;

use crate::remover::SharedRemover;

// Maximum allowed size for image upload requests
pub const MAX_IMAGE_SIZE_BYTES: usize = 100 * 1024 * 1024; // 100MB

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub remover: SharedRemover,
    /// Longer-side bound applied before inference; 0 disables downscaling.
    pub max_dimension: u32,
}
