// Pre- and post-processing for the U²-Net family of salient object segmentation models.

use super::RemovalError;
use image::{
    DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgba, RgbaImage,
    imageops::{self, FilterType},
};
use ndarray::{Array4, ArrayD, Ix4, s};
use std::io::Cursor;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Segmentation model family the loaded ONNX file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelKind {
    /// Lightweight U²-Net (~4.7 MB)
    U2netp,
    /// Full U²-Net (~176 MB)
    U2net,
    /// Pruned U²-Net (~43 MB)
    Silueta,
    /// IS-Net general use (~179 MB)
    IsnetGeneralUse,
}

impl ModelKind {
    /// Side length of the square input tensor the model expects.
    pub fn input_size(self) -> u32 {
        match self {
            ModelKind::U2netp | ModelKind::U2net | ModelKind::Silueta => 320,
            ModelKind::IsnetGeneralUse => 1024,
        }
    }

    fn normalization(self) -> ([f32; 3], [f32; 3]) {
        match self {
            ModelKind::U2netp | ModelKind::U2net | ModelKind::Silueta => {
                (IMAGENET_MEAN, IMAGENET_STD)
            }
            ModelKind::IsnetGeneralUse => ([0.5; 3], [1.0; 3]),
        }
    }
}

/// Builds the NCHW input tensor for `kind` from a decoded image.
pub fn preprocess(image: &DynamicImage, kind: ModelKind) -> Array4<f32> {
    let size = kind.input_size();
    let resized = imageops::resize(&image.to_rgb8(), size, size, FilterType::Lanczos3);

    // Pixels are scaled by the brightest sample rather than by 255.
    let max_value = f32::from(resized.as_raw().iter().copied().max().unwrap_or(0).max(1));
    let (mean, std) = kind.normalization();

    let mut tensor = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (f32::from(pixel[c]) / max_value - mean[c]) / std[c];
        }
    }
    tensor
}

/// Turns the model's first output into an 8-bit mask of `width` x `height`.
///
/// The prediction is min/max normalized before quantization, so the most
/// confident foreground pixel always maps to 255.
pub fn mask_from_prediction(
    prediction: ArrayD<f32>,
    width: u32,
    height: u32,
) -> Result<GrayImage, RemovalError> {
    let prediction = prediction.into_dimensionality::<Ix4>().map_err(|e| {
        RemovalError::Inference(format!("unexpected output tensor rank: {}", e))
    })?;
    let (batch, channels, mask_height, mask_width) = prediction.dim();
    if batch == 0 || channels == 0 || mask_height == 0 || mask_width == 0 {
        return Err(RemovalError::Inference(format!(
            "empty output tensor of shape {:?}",
            prediction.shape()
        )));
    }

    let plane = prediction.slice(s![0, 0, .., ..]);
    let (min, max) = plane
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    let mask = ImageBuffer::from_fn(mask_width as u32, mask_height as u32, |x, y| {
        let value = plane[[y as usize, x as usize]];
        let normalized = if range > f32::EPSILON {
            (value - min) / range
        } else {
            // A flat prediction carries no contrast; keep its absolute level.
            value.clamp(0.0, 1.0)
        };
        Luma([(normalized * 255.0).round() as u8])
    });

    if mask.dimensions() == (width, height) {
        return Ok(mask);
    }
    Ok(imageops::resize(&mask, width, height, FilterType::Lanczos3))
}

/// Uses `mask` as the alpha channel of `image`; fully transparent pixels are zeroed.
pub fn apply_mask(image: &DynamicImage, mask: &GrayImage) -> RgbaImage {
    let rgba = image.to_rgba8();
    let mut cutout = RgbaImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = mask.get_pixel_checked(x, y).map_or(0, |p| p[0]);
        let out = if alpha == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([pixel[0], pixel[1], pixel[2], alpha])
        };
        cutout.put_pixel(x, y, out);
    }

    cutout
}

pub fn encode_png(cutout: RgbaImage) -> Result<Vec<u8>, RemovalError> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(cutout)
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(RemovalError::Encode)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use ndarray::IxDyn;

    #[test]
    fn test_preprocess_shape_matches_model_input() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 25, Rgb([10, 20, 30])));

        let tensor = preprocess(&img, ModelKind::U2netp);
        assert_eq!(tensor.shape(), &[1, 3, 320, 320]);

        let tensor = preprocess(&img, ModelKind::IsnetGeneralUse);
        assert_eq!(tensor.shape(), &[1, 3, 1024, 1024]);
    }

    #[test]
    fn test_preprocess_normalizes_white_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
        let tensor = preprocess(&img, ModelKind::U2netp);

        for c in 0..3 {
            let expected = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            let actual = tensor[[0, c, 100, 100]];
            assert!((actual - expected).abs() < 2e-2, "channel {}: {}", c, actual);
        }
    }

    #[test]
    fn test_preprocess_scales_by_brightest_sample() {
        // A uniform image scales to 1.0 no matter how dark it is.
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([64, 64, 64])));
        let tensor = preprocess(&img, ModelKind::IsnetGeneralUse);
        assert!((tensor[[0, 0, 5, 5]] - 0.5).abs() < 2e-2);
    }

    #[test]
    fn test_mask_is_min_max_normalized() {
        let prediction =
            ArrayD::from_shape_vec(IxDyn(&[1, 1, 1, 2]), vec![0.2_f32, 0.8]).unwrap();

        let mask = mask_from_prediction(prediction, 2, 1).unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_mask_is_resized_to_image() {
        let prediction = ArrayD::from_elem(IxDyn(&[1, 1, 4, 4]), 1.0_f32);

        let mask = mask_from_prediction(prediction, 13, 7).unwrap();
        assert_eq!(mask.dimensions(), (13, 7));
        assert!(mask.pixels().all(|p| p[0] >= 254));
    }

    #[test]
    fn test_mask_rejects_wrong_rank() {
        let prediction = ArrayD::from_elem(IxDyn(&[4, 4]), 0.5_f32);
        assert!(matches!(
            mask_from_prediction(prediction, 4, 4),
            Err(RemovalError::Inference(_))
        ));
    }

    #[test]
    fn test_apply_mask_sets_alpha() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 1, Rgb([200, 100, 50])));
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(1, 0, Luma([180]));

        let cutout = apply_mask(&img, &mask);
        assert_eq!(cutout.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(cutout.get_pixel(1, 0), &Rgba([200, 100, 50, 180]));
    }

    #[test]
    fn test_encode_png_round_trips_alpha() {
        let cutout = RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 4]));
        let png = encode_png(cutout).unwrap();

        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(2, 2), &Rgba([1, 2, 3, 4]));
    }
}
