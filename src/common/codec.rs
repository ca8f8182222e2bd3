//! Image payload decoding and encoding shared by function and model steps.

use crate::error::StepError;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Decode an encoded image payload, remembering its container format so the
/// result can be written back the same way.
pub fn decode(payload: &[u8]) -> Result<(DynamicImage, ImageFormat), StepError> {
    let format = image::guess_format(payload).map_err(|e| StepError::Decode(e.to_string()))?;
    let image = image::load_from_memory_with_format(payload, format)
        .map_err(|e| StepError::Decode(e.to_string()))?;
    Ok((image, format))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, StepError> {
    let format = output_format(format);
    let mut buffer = Cursor::new(Vec::new());
    match format {
        // The JPEG encoder only accepts 8-bit colour without alpha.
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buffer, format),
        _ => image.write_to(&mut buffer, format),
    }
    .map_err(|e| StepError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}

fn output_format(format: ImageFormat) -> ImageFormat {
    match format {
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp => format,
        _ => ImageFormat::Png,
    }
}

#[cfg(test)]
pub(crate) fn encoded_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) * 3 % 256) as u8])
    });
    encode(&DynamicImage::ImageRgb8(image), format).expect("test image encodes")
}
