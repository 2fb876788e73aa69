// API handlers for the web server

use super::{
    AppState,
    error::ApiError,
    extract_request_data::extract_upload,
    image_codec::{data_uri, detect_mime, resize_if_needed},
    models::ProcessImageResponse,
};
use axum::{
    Json,
    extract::{Request, State},
    response::Html,
};
use std::borrow::Cow;
use tracing::{debug, info};
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../../static/index.html");

// --- GET / ---
// Serves the upload page
pub async fn home() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// --- POST /process-image ---
// Removes the background of the uploaded `image` field and returns both
// the original and the cutout as data URIs
pub async fn process_image(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<ProcessImageResponse>, ApiError> {
    let request_id = Uuid::new_v4();

    let upload = extract_upload(request).await?;

    info!(
        "Process image request: request_id={}, file={:?}, declared_type={:?}, size={} bytes",
        request_id,
        upload.file_name,
        upload.content_type,
        upload.data.len()
    );

    // `Bytes` clones share the buffer; the upload itself is never modified.
    let original = upload.data.clone();
    let remover = state.remover.clone();
    let max_dimension = state.max_dimension;

    let subject = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ApiError> {
        let model_input = if max_dimension > 0 {
            resize_if_needed(&original, max_dimension)?
        } else {
            Cow::Borrowed(&original[..])
        };
        Ok(remover.remove_background(&model_input)?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Background removal task failed: {}", e)))??;

    debug!(
        "Background removed: request_id={}, cutout size={} bytes",
        request_id,
        subject.len()
    );

    let original_mime = detect_mime(&upload.data, upload.content_type.as_deref());
    let response = ProcessImageResponse {
        original_image: data_uri(&original_mime, &upload.data),
        subject_image: data_uri(mime::IMAGE_PNG.as_ref(), &subject),
    };

    info!(
        "Process image completed: request_id={}, original_type={}",
        request_id, original_mime
    );

    Ok(Json(response))
}
