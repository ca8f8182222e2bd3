use crate::error::{ConfigurationError, StepError};
use crate::pipeline::descriptor::StepDescriptor;
use crate::pipeline::factory::StepFactory;
use crate::pipeline::params::StepParams;
use crate::pipeline::steps::{InferenceModel, ModelLoader, ModelStep, Step};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const LIVEDIFF_MODEL: &str = "custom_livediff_model";
pub const LORA_MODEL: &str = "custom_lora_model";
pub const DEFAULT_LORA_BASE_MODEL: &str = "stabilityai/stable-diffusion-2-1-base";

pub fn livediff_step(
    descriptor: &StepDescriptor,
    factory: &StepFactory,
) -> Result<Arc<dyn Step>, ConfigurationError> {
    let loaded = factory
        .model_loader()
        .ok_or_else(|| no_runtime(&descriptor.selector))
        .and_then(|loader| {
            info!("Loading LiveDiff model '{}'...", descriptor.selector);
            loader.load(&descriptor.selector, &descriptor.params)
        });
    Ok(Arc::new(ModelStep::new(descriptor, loaded)))
}

pub fn lora_step(
    descriptor: &StepDescriptor,
    factory: &StepFactory,
) -> Result<Arc<dyn Step>, ConfigurationError> {
    let loaded = factory
        .model_loader()
        .ok_or_else(|| no_runtime(&descriptor.selector))
        .and_then(|loader| load_lora(loader, &descriptor.params));
    Ok(Arc::new(ModelStep::new(descriptor, loaded)))
}

// Base model first, then the adapter weights on top.
fn load_lora(loader: &dyn ModelLoader, params: &StepParams) -> Result<Box<dyn InferenceModel>, StepError> {
    let weights = params
        .str("lora_weights_path")?
        .filter(|path| !path.trim().is_empty())
        .ok_or_else(|| StepError::ResourceLoad {
            model: LORA_MODEL.to_string(),
            reason: "LoRA weights path not provided in parameters".to_string(),
        })?;
    let base_model = params.str("base_model")?.unwrap_or(DEFAULT_LORA_BASE_MODEL);

    let mut model = loader.load(base_model, params)?;
    info!("Base model '{}' loaded successfully.", base_model);
    model.load_adapter(Path::new(weights))?;
    info!("LoRA weights from '{}' loaded successfully.", weights);
    Ok(model)
}

fn no_runtime(model: &str) -> StepError {
    StepError::ResourceLoad {
        model: model.to_string(),
        reason: "no model runtime is installed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::codec::encoded_test_image;
    use crate::common::Frame;
    use crate::pipeline::steps::model_step::test_support::StubLoader;
    use image::ImageFormat;
    use std::path::PathBuf;

    fn factory(loader: Arc<StubLoader>) -> StepFactory {
        crate::plugins::register(StepFactory::builder())
            .model_loader(loader)
            .build()
    }

    #[test]
    fn test_lora_loads_base_model_and_applies_adapter() {
        let loader = Arc::new(StubLoader::default());
        let descriptor = StepDescriptor::model(
            "stylize",
            LORA_MODEL,
            StepParams::new()
                .with("lora_weights_path", "/weights/style.safetensors")
                .with("prompt", "watercolor"),
        );

        let step = factory(Arc::clone(&loader)).create_step(&descriptor).unwrap();
        assert_eq!(*loader.loaded.lock().unwrap(), vec![DEFAULT_LORA_BASE_MODEL.to_string()]);
        assert_eq!(
            *loader.adapters.lock().unwrap(),
            vec![PathBuf::from("/weights/style.safetensors")]
        );

        let frame = Frame::new(encoded_test_image(4, 4, ImageFormat::Png));
        assert!(step.process(&frame).unwrap().is_some());
        assert_eq!(*loader.prompts.lock().unwrap(), vec!["watercolor".to_string()]);
    }

    #[test]
    fn test_lora_without_weights_is_disabled() {
        let loader = Arc::new(StubLoader::default());
        let descriptor = StepDescriptor::model("stylize", LORA_MODEL, StepParams::new());

        let step = factory(Arc::clone(&loader)).create_step(&descriptor).unwrap();
        let frame = Frame::new(encoded_test_image(4, 4, ImageFormat::Png));
        assert!(matches!(step.process(&frame), Err(StepError::Disabled { .. })));
        assert_eq!(loader.load_count(), 0);
    }

    #[test]
    fn test_livediff_loads_its_own_model() {
        let loader = Arc::new(StubLoader::default());
        let descriptor = StepDescriptor::model("live", LIVEDIFF_MODEL, StepParams::new());

        factory(Arc::clone(&loader)).create_step(&descriptor).unwrap();
        assert_eq!(*loader.loaded.lock().unwrap(), vec![LIVEDIFF_MODEL.to_string()]);
    }

    #[test]
    fn test_plugin_models_without_runtime_are_disabled() {
        let factory = crate::plugins::register(StepFactory::builder()).build();
        let descriptor = StepDescriptor::model("live", LIVEDIFF_MODEL, StepParams::new());

        let step = factory.create_step(&descriptor).unwrap();
        let frame = Frame::new(encoded_test_image(4, 4, ImageFormat::Png));
        assert!(matches!(step.process(&frame), Err(StepError::Disabled { .. })));
    }
}
