// API-specific data models for the web server

use serde::{Deserialize, Serialize};

/// Response to a successful `POST /process-image`.
///
/// Both fields are `data:` URIs that can be used directly as an image source.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProcessImageResponse {
    pub original_image: String,
    pub subject_image: String,
}

/// Body of every error response.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorBody {
    pub error: String,
}
