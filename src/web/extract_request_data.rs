use axum::{
    body::Bytes,
    extract::{
        FromRequest, Multipart, Request,
        multipart::MultipartError,
    },
    http::{StatusCode, header},
};
use mime::Mime;
use tracing::{debug, warn};

use super::error::ApiError;

/// Name of the multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// An uploaded image file, exactly as received.
#[derive(Debug, Clone)]
pub struct Upload {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub file_name: String,
}

/// Pulls the `image` field out of a `multipart/form-data` request.
///
/// Requests of any other content type, or with an unparseable one, are
/// treated as carrying no image.
pub async fn extract_upload(request: Request) -> Result<Upload, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Mime>().ok());

    let is_multipart = content_type
        .as_ref()
        .is_some_and(|mime| mime.essence_str() == mime::MULTIPART_FORM_DATA.essence_str());
    if !is_multipart {
        debug!("Request content type {:?} is not multipart/form-data", content_type);
        return Err(ApiError::MissingImage);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to process multipart request: {}", e)))?;

    let mut upload: Option<Upload> = None;
    let mut ignored_fields = 0;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            let field_name = field.name().unwrap_or("unnamed").to_string();
            debug!("Ignoring multipart field: {}", field_name);
            ignored_fields += 1;
            continue;
        }

        // A plain form value named `image` is not a file upload.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            debug!("Ignoring '{}' field without a file name", IMAGE_FIELD);
            ignored_fields += 1;
            continue;
        };

        if upload.is_some() {
            warn!("Multiple '{}' fields found in multipart request, using the first one", IMAGE_FIELD);
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        debug!(
            "Received file {:?} with content type: {:?}",
            file_name, content_type
        );

        let data = field.bytes().await.map_err(multipart_error)?;
        if data.is_empty() {
            return Err(ApiError::EmptyImage);
        }

        upload = Some(Upload {
            data,
            content_type,
            file_name,
        });
    }

    if ignored_fields > 0 {
        debug!("Ignored {} other fields in multipart request", ignored_fields);
    }

    upload.ok_or(ApiError::MissingImage)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!("Uploaded file is too large: {}", err.body_text()))
    } else {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", err.body_text()))
    }
}
