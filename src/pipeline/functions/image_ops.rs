use crate::common::{codec, Frame};
use crate::error::StepError;
use crate::pipeline::params::StepParams;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

/// `resize_image(size: [w, h])`: exact resize with a triangle filter.
pub fn resize_image(frame: &Frame, params: &StepParams) -> Result<Option<Frame>, StepError> {
    let (width, height) = params.require_size("size")?;
    resize_with(frame, width, height, FilterType::Triangle)
}

/// `enhance_image(factor)`: scale every channel, saturating at 255.
pub fn enhance_image(frame: &Frame, params: &StepParams) -> Result<Option<Frame>, StepError> {
    let factor = params.require_f64("factor")?;
    let (image, format) = codec::decode(frame.payload())?;
    let enhanced = scale_intensity(&image, factor);
    Ok(Some(frame.with_payload(codec::encode(&enhanced, format)?)))
}

pub(crate) fn resize_with(
    frame: &Frame,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<Option<Frame>, StepError> {
    let (image, format) = codec::decode(frame.payload())?;
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let resized = rgb.resize_exact(width, height, filter);
    Ok(Some(frame.with_payload(codec::encode(&resized, format)?)))
}

pub(crate) fn scale_intensity(image: &DynamicImage, factor: f64) -> DynamicImage {
    let mut rgb: RgbImage = image.to_rgb8();
    for pixel in rgb.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (*channel as f64 * factor).abs().round().min(255.0) as u8;
        }
    }
    DynamicImage::ImageRgb8(rgb)
}
