use architectures::{Interpolation, PreprocessSpec};
use image::{
    ImageError, RgbImage,
    error::{LimitError, LimitErrorKind, ParameterError, ParameterErrorKind},
    imageops::{self, FilterType},
};
use log::debug;
use ndarray::Array4;
use nn::{Device, Tensor};

use crate::{InferErr, Result};

/// Decodes an encoded image (PNG, JPEG, ...) into 3 channel RGB.
///
/// Alpha is dropped and grayscale is expanded, no color type is rejected.
///
/// # Errors
/// `ImageLoad` if the bytes are not a complete image of a supported format.
pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes)?.to_rgb8();

    if image.width() == 0 || image.height() == 0 {
        return Err(InferErr::ImageLoad(ImageError::Parameter(
            ParameterError::from_kind(ParameterErrorKind::DimensionMismatch),
        )));
    }

    Ok(image)
}

/// The most pixels a resized image may have before it is cropped.
pub const MAX_RESIZED_PIXELS: u64 = 1 << 26;

/// The size an image gets when its short side is resized to `target`, the long side scaled
/// proportionally and truncated.
///
/// # Returns
/// The new size, or `None` if it would not fit in `MAX_RESIZED_PIXELS`.
pub fn short_side_size((width, height): (u32, u32), target: u32) -> Option<(u32, u32)> {
    let (long, short) = (width.max(height) as u64, width.min(height) as u64);
    let scaled = (long * target as u64 / short.max(1)).max(1);

    if scaled.saturating_mul(target as u64) > MAX_RESIZED_PIXELS {
        return None;
    }
    let scaled = u32::try_from(scaled).ok()?;

    Some(if width <= height {
        (target, scaled)
    } else {
        (scaled, target)
    })
}

fn filter(interpolation: Interpolation) -> FilterType {
    match interpolation {
        Interpolation::Bilinear => FilterType::Triangle,
        Interpolation::Bicubic => FilterType::CatmullRom,
    }
}

/// Resizes `image` so that its short side is `target`.
///
/// # Errors
/// `ImageLoad` if the image is so elongated the resized copy would not fit in
/// `MAX_RESIZED_PIXELS`.
pub fn resize_short_side(
    image: &RgbImage,
    target: u32,
    interpolation: Interpolation,
) -> Result<RgbImage> {
    let Some((width, height)) = short_side_size(image.dimensions(), target) else {
        return Err(InferErr::ImageLoad(ImageError::Limits(LimitError::from_kind(
            LimitErrorKind::DimensionError,
        ))));
    };

    if (width, height) == image.dimensions() {
        return Ok(image.clone());
    }

    Ok(imageops::resize(image, width, height, filter(interpolation)))
}

/// The top left corner of a centered `side` square, halves rounded to even.
pub fn center_offset((width, height): (u32, u32), side: u32) -> (u32, u32) {
    let offset = |len: u32| (len.saturating_sub(side) as f64 / 2.).round_ties_even() as u32;
    (offset(width), offset(height))
}

/// Crops the centered `side` square out of `image`.
pub fn center_crop(image: &RgbImage, side: u32) -> RgbImage {
    let (x, y) = center_offset(image.dimensions(), side);
    imageops::crop_imm(image, x, y, side, side).to_image()
}

/// Scales to `[0, 1]`, normalizes every channel and lays the image out as a `(1, 3, H, W)`
/// batch.
pub fn to_tensor(image: &RgbImage, spec: &PreprocessSpec, device: Device) -> Tensor {
    let (width, height) = image.dimensions();
    let mut data = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.;
            data[[0, c, y as usize, x as usize]] =
                (v - spec.channel_means[c]) / spec.channel_stds[c];
        }
    }

    Tensor::new(data, device)
}

/// Turns raw image bytes into graph inputs, deterministically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
    spec: PreprocessSpec,
}

impl Preprocessor {
    /// Creates a new `Preprocessor`.
    ///
    /// # Arguments
    /// * `spec` - The statistics the graph was trained with.
    ///
    /// # Returns
    /// A new `Preprocessor` or `InvalidPreprocess` if `spec` is infeasible.
    pub fn new(spec: PreprocessSpec) -> Result<Self> {
        match spec.problem() {
            Some(reason) => Err(InferErr::InvalidPreprocess(reason)),
            None => Ok(Self { spec }),
        }
    }

    pub fn spec(&self) -> &PreprocessSpec {
        &self.spec
    }

    /// Decodes, resizes, crops and tensorizes an image.
    ///
    /// # Arguments
    /// * `bytes` - The encoded image.
    /// * `device` - The device the tensor is tagged with.
    ///
    /// # Returns
    /// A `(1, 3, crop, crop)` tensor.
    pub fn prepare(&self, bytes: &[u8], device: Device) -> Result<Tensor> {
        let spec = &self.spec;
        let image = decode(bytes)?;
        let resized = resize_short_side(&image, spec.resize_dimension, spec.interpolation)?;
        let cropped = center_crop(&resized, spec.crop_dimension);

        debug!(
            "preprocessed {}x{} -> {}x{} -> {}x{}",
            image.width(),
            image.height(),
            resized.width(),
            resized.height(),
            cropped.width(),
            cropped.height()
        );

        Ok(to_tensor(&cropped, spec, device))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbaImage};

    use super::*;

    fn encode(image: DynamicImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn short_side_sizes() {
        assert_eq!(short_side_size((500, 500), 256), Some((256, 256)));
        assert_eq!(short_side_size((640, 480), 256), Some((341, 256)));
        assert_eq!(short_side_size((480, 640), 342), Some((342, 456)));
        assert_eq!(short_side_size((10, 1000), 2), Some((2, 200)));
        assert_eq!(short_side_size((1000, 1), 1), Some((1000, 1)));
    }

    #[test]
    fn elongated_images_exceed_the_resize_budget() {
        assert_eq!(short_side_size((1, 20_000_000), 342), None);
        assert_eq!(short_side_size((u32::MAX, 1), 342), None);
        assert_eq!(short_side_size((1, 200_000), 342), None);
        assert!(short_side_size((3, 200_000), 2).is_some());

        let thin = encode(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            1,
            200_000,
            Rgb([10, 20, 30]),
        )));
        let preprocessor = Preprocessor::new(PreprocessSpec::imagenet(342, 299)).unwrap();
        assert!(matches!(
            preprocessor.prepare(&thin, Device::Cpu),
            Err(InferErr::ImageLoad(ImageError::Limits(_)))
        ));
    }

    #[test]
    fn offsets_round_half_to_even() {
        assert_eq!(center_offset((256, 256), 224), (16, 16));
        // (341 - 224) / 2 = 58.5
        assert_eq!(center_offset((341, 256), 224), (58, 16));
        // (227 - 224) / 2 = 1.5
        assert_eq!(center_offset((227, 224), 224), (2, 0));
    }

    #[test]
    fn any_color_type_becomes_rgb() {
        let gray = encode(DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, [7].into())));
        assert_eq!(decode(&gray).unwrap().get_pixel(0, 0), &Rgb([7, 7, 7]));

        let rgba = encode(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            [1, 2, 3, 0].into(),
        )));
        assert_eq!(decode(&rgba).unwrap().get_pixel(3, 3), &Rgb([1, 2, 3]));
    }

    #[test]
    fn garbage_is_an_image_load_error() {
        assert!(matches!(decode(b"GIF89a..."), Err(InferErr::ImageLoad(_))));
        assert!(matches!(decode(&[]), Err(InferErr::ImageLoad(_))));
    }

    #[test]
    fn tensor_is_normalized_chw() {
        let image = RgbImage::from_pixel(3, 2, Rgb([255, 0, 128]));
        let spec = PreprocessSpec::imagenet(2, 2);
        let tensor = to_tensor(&image, &spec, Device::Cpu);

        assert_eq!(tensor.shape(), &[1, 3, 2, 3]);
        let data = tensor.data();
        assert!((data[[0, 0, 1, 2]] - (1. - 0.485) / 0.229).abs() < 1e-6);
        assert!((data[[0, 1, 0, 0]] - (0. - 0.456) / 0.224).abs() < 1e-6);
    }

    #[test]
    fn prepare_yields_crop_sized_batches() {
        let bytes = encode(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            500,
            300,
            Rgb([10, 20, 30]),
        )));
        let preprocessor = Preprocessor::new(PreprocessSpec::imagenet(256, 224)).unwrap();
        let tensor = preprocessor.prepare(&bytes, Device::Cpu).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        assert_eq!(tensor.device(), Device::Cpu);
    }

    #[test]
    fn bicubic_specs_resize_with_catmull_rom() {
        let image = RgbImage::from_fn(40, 30, |x, y| {
            let v = ((x * 37 + y * 91) * (x ^ y) % 256) as u8;
            Rgb([v, 255 - v, v / 2])
        });
        let bilinear = resize_short_side(&image, 12, Interpolation::Bilinear).unwrap();
        let bicubic = resize_short_side(&image, 12, Interpolation::Bicubic).unwrap();

        assert_eq!(bicubic.dimensions(), (16, 12));
        assert_eq!(bicubic, imageops::resize(&image, 16, 12, FilterType::CatmullRom));
        assert_ne!(bilinear, bicubic);
    }

    #[test]
    fn infeasible_specs_are_rejected() {
        assert!(matches!(
            Preprocessor::new(PreprocessSpec::imagenet(224, 299)),
            Err(InferErr::InvalidPreprocess(_))
        ));
    }
}
