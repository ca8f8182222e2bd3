//! Bundled step plugins: two image functions and two model variants.

pub mod custom_functions;
pub mod custom_models;

use crate::pipeline::factory::StepFactoryBuilder;

pub fn register(builder: StepFactoryBuilder) -> StepFactoryBuilder {
    builder
        .function("custom_resize_image", custom_functions::custom_resize_image)
        .function("custom_enhance_image", custom_functions::custom_enhance_image)
        .model(custom_models::LIVEDIFF_MODEL, custom_models::livediff_step)
        .model(custom_models::LORA_MODEL, custom_models::lora_step)
}
