// Error types for the API server

use super::models::ErrorBody;
use crate::remover::RemovalError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

const BACKGROUND_REMOVAL_FAILED: &str = "Failed to process image background. The image might be corrupted or in an unsupported format.";
const INTERNAL_SERVER_ERROR: &str = "An internal server error occurred.";

/// API server error types
#[derive(Debug)]
pub enum ApiError {
    // Client input errors
    MissingImage,
    EmptyImage,
    BadRequest(String),
    PayloadTooLarge(String),
    UnreadableImage(String),

    // The model rejected the image; details stay in the server log
    BackgroundRemovalFailed(String),

    // Anything else; details stay in the server log
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingImage => (
                StatusCode::BAD_REQUEST,
                "No image file provided".to_string(),
            ),
            Self::EmptyImage => (
                StatusCode::BAD_REQUEST,
                "The uploaded image file is empty".to_string(),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            Self::UnreadableImage(details) => {
                warn!("Rejected unreadable upload: {}", details);
                (
                    StatusCode::BAD_REQUEST,
                    format!("Unable to decode the uploaded image: {}", details),
                )
            }
            Self::BackgroundRemovalFailed(details) => {
                error!("Background removal failed: {}", details);
                (
                    StatusCode::BAD_REQUEST,
                    BACKGROUND_REMOVAL_FAILED.to_string(),
                )
            }
            Self::Internal(details) => {
                error!("An unexpected error occurred: {}", details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_SERVER_ERROR.to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<image::ImageError> for ApiError {
    fn from(err: image::ImageError) -> Self {
        match err {
            // Re-encoding the downscaled copy is on us, not on the upload.
            image::ImageError::Encoding(_) | image::ImageError::Parameter(_) => {
                Self::Internal(format!("Failed to re-encode resized image: {}", err))
            }
            other => Self::UnreadableImage(other.to_string()),
        }
    }
}

impl From<RemovalError> for ApiError {
    fn from(err: RemovalError) -> Self {
        match err {
            RemovalError::Decode(e) => Self::UnreadableImage(e.to_string()),
            RemovalError::Inference(details) => Self::BackgroundRemovalFailed(details),
            other @ (RemovalError::ModelLoad { .. }
            | RemovalError::Encode(_)
            | RemovalError::SessionPoisoned) => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ApiError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_image_body() {
        let (status, body) = render(ApiError::MissingImage).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "No image file provided");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let (status, body) = render(ApiError::Internal("secret path /etc/model".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_inference_failure_is_client_error_with_generic_message() {
        let err = ApiError::from(RemovalError::Inference("node 42 exploded".into()));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, BACKGROUND_REMOVAL_FAILED);
    }

    #[test]
    fn test_removal_error_mapping() {
        let decode = image::load_from_memory(b"nope").unwrap_err();
        assert!(matches!(
            ApiError::from(RemovalError::Decode(decode)),
            ApiError::UnreadableImage(_)
        ));
        assert!(matches!(
            ApiError::from(RemovalError::SessionPoisoned),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn test_image_error_mapping() {
        let decode = image::load_from_memory(b"nope").unwrap_err();
        assert!(matches!(ApiError::from(decode), ApiError::UnreadableImage(_)));
    }
}
