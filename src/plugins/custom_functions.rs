use crate::common::{codec, Frame};
use crate::error::StepError;
use crate::pipeline::functions::image_ops::{resize_with, scale_intensity};
use crate::pipeline::params::StepParams;
use image::imageops::FilterType;

const DEFAULT_SIGMA: f64 = 2.0;
const DEFAULT_THRESHOLD: f64 = 0.0;

/// `custom_resize_image(size: [w, h])`: bicubic (Catmull-Rom) resize.
pub fn custom_resize_image(frame: &Frame, params: &StepParams) -> Result<Option<Frame>, StepError> {
    let (width, height) = params.require_size("size")?;
    resize_with(frame, width, height, FilterType::CatmullRom)
}

/// `custom_enhance_image(factor, sigma?, threshold?)`: unsharp-mask detail
/// pass followed by the plain intensity scale.
pub fn custom_enhance_image(frame: &Frame, params: &StepParams) -> Result<Option<Frame>, StepError> {
    let factor = params.require_f64("factor")?;
    let sigma = params.f64("sigma")?.unwrap_or(DEFAULT_SIGMA);
    if sigma <= 0.0 {
        return Err(StepError::invalid_parameter("sigma", "must be positive"));
    }
    let threshold = params.f64("threshold")?.unwrap_or(DEFAULT_THRESHOLD);

    let (image, format) = codec::decode(frame.payload())?;
    let detailed = image.unsharpen(sigma as f32, threshold.round() as i32);
    let enhanced = scale_intensity(&detailed, factor);
    Ok(Some(frame.with_payload(codec::encode(&enhanced, format)?)))
}
