use base64::prelude::{BASE64_STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, ImageReader, imageops::FilterType};
use std::{borrow::Cow, io::Cursor};
use tracing::debug;

/// Size that fits `width` x `height` into a `max_dimension` square, or `None`
/// when the image already fits (or `max_dimension` is 0).
///
/// The longer side becomes exactly `max_dimension`; the shorter side is
/// rounded and never drops below one pixel.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return None;
    }

    let scale = |side: u32, longer: u32| -> u32 {
        let scaled = (u64::from(side) * u64::from(max_dimension) + u64::from(longer) / 2)
            / u64::from(longer);
        (scaled as u32).max(1)
    };

    if width >= height {
        Some((max_dimension, scale(height, width)))
    } else {
        Some((scale(width, height), max_dimension))
    }
}

/// Downscales `bytes` so neither side exceeds `max_dimension`.
///
/// Images that already fit are returned borrowed and byte-identical; anything
/// larger is decoded, resized with a Lanczos filter and re-encoded as PNG.
pub fn resize_if_needed(bytes: &[u8], max_dimension: u32) -> Result<Cow<'_, [u8]>, image::ImageError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_dimensions()?;

    let Some((new_width, new_height)) = target_dimensions(width, height, max_dimension) else {
        debug!("Image {}x{} fits within {}px, not resizing", width, height, max_dimension);
        return Ok(Cow::Borrowed(bytes));
    };

    debug!(
        "Downscaling image from {}x{} to {}x{}",
        width, height, new_width, new_height
    );

    let resized = image::load_from_memory(bytes)?.resize_exact(
        new_width,
        new_height,
        FilterType::Lanczos3,
    );
    // Keep the output within the 8-bit color types the PNG encoder always accepts.
    let resized = if resized.color().has_alpha() {
        DynamicImage::ImageRgba8(resized.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(resized.to_rgb8())
    };

    let mut buffer = Cursor::new(Vec::new());
    resized.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(Cow::Owned(buffer.into_inner()))
}

/// MIME type to report for an uploaded file.
///
/// The format sniffed from the bytes wins; the declared part type is only
/// used when sniffing fails and it names an image type.
pub fn detect_mime(bytes: &[u8], declared: Option<&str>) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }

    declared
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .filter(|parsed| parsed.type_() == mime::IMAGE)
        .map(|parsed| parsed.essence_str().to_string())
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
}

pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64_STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([12, 34, 56]))),
            ImageFormat::Png,
        )
    }

    #[test]
    fn test_target_dimensions_fits() {
        assert_eq!(target_dimensions(1024, 1024, 1024), None);
        assert_eq!(target_dimensions(10, 900, 1024), None);
        assert_eq!(target_dimensions(5000, 5000, 0), None);
    }

    #[test]
    fn test_target_dimensions_landscape_and_portrait() {
        assert_eq!(target_dimensions(2048, 1024, 1024), Some((1024, 512)));
        assert_eq!(target_dimensions(300, 900, 600), Some((200, 600)));
        assert_eq!(target_dimensions(1025, 1025, 1024), Some((1024, 1024)));
    }

    #[test]
    fn test_target_dimensions_rounds_and_clamps_short_side() {
        // 1000 * 1024 / 3000 = 341.33
        assert_eq!(target_dimensions(3000, 1000, 1024), Some((1024, 341)));
        assert_eq!(target_dimensions(5000, 1, 1024), Some((1024, 1)));
    }

    #[test]
    fn test_resize_if_needed_passes_small_images_through() {
        let bytes = png(64, 48);
        let result = resize_if_needed(&bytes, 1024).unwrap();

        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result.as_ref(), bytes.as_slice());
    }

    #[test]
    fn test_resize_if_needed_downscales_preserving_aspect_ratio() {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 100, Rgb([200, 10, 10]))),
            ImageFormat::Jpeg,
        );
        let result = resize_if_needed(&bytes, 200).unwrap();

        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(image::guess_format(&result).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&result).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 50));
    }

    #[test]
    fn test_resize_if_needed_keeps_alpha() {
        let bytes = encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(50, 300, Rgba([1, 2, 3, 0]))),
            ImageFormat::Png,
        );
        let result = resize_if_needed(&bytes, 100).unwrap();

        let decoded = image::load_from_memory(&result).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (17, 100));
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_resize_if_needed_rejects_non_images() {
        assert!(resize_if_needed(b"definitely not an image", 1024).is_err());
        assert!(resize_if_needed(&[], 1024).is_err());
    }

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(&png(2, 2), Some("image/jpeg")), "image/png");
        assert_eq!(detect_mime(b"???", Some("image/heic")), "image/heic");
        assert_eq!(
            detect_mime(b"???", Some("image/x-custom; charset=binary")),
            "image/x-custom"
        );
        assert_eq!(detect_mime(b"???", Some("text/plain")), "application/octet-stream");
        assert_eq!(detect_mime(b"???", None), "application/octet-stream");
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri("image/png", b"hello"), "data:image/png;base64,aGVsbG8=");
        assert_eq!(data_uri("image/gif", &[]), "data:image/gif;base64,");
    }
}
