use super::Step;
use crate::common::{codec, Frame};
use crate::error::StepError;
use crate::pipeline::descriptor::StepDescriptor;
use crate::pipeline::params::StepParams;
use image::DynamicImage;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};

/// A loaded, heavyweight inference object owned by exactly one step.
pub trait InferenceModel: Send {
    fn infer(&mut self, image: DynamicImage, params: &StepParams) -> Result<DynamicImage, StepError>;

    /// Apply adapter weights (e.g. LoRA) on top of the loaded model.
    fn load_adapter(&mut self, weights: &Path) -> Result<(), StepError> {
        Err(StepError::Unsupported(format!(
            "model cannot load adapter weights from {}",
            weights.display()
        )))
    }
}

/// The model runtime. Installed into the step factory at startup.
pub trait ModelLoader: Send + Sync {
    /// Whether `model_name` names a model this runtime knows how to load.
    fn provides(&self, model_name: &str) -> bool;

    fn load(&self, model_name: &str, params: &StepParams) -> Result<Box<dyn InferenceModel>, StepError>;
}

enum ModelState {
    Ready(Mutex<Box<dyn InferenceModel>>),
    Disabled(String),
}

/// Step running a model loaded once at construction. A failed load disables
/// the step for its whole lifetime; the load is never retried.
pub struct ModelStep {
    name: String,
    kind: String,
    model_name: String,
    params: StepParams,
    state: ModelState,
}

impl ModelStep {
    pub fn new(descriptor: &StepDescriptor, loaded: Result<Box<dyn InferenceModel>, StepError>) -> Self {
        let state = match loaded {
            Ok(model) => {
                info!("Model '{}' loaded for step '{}'", descriptor.selector, descriptor.name);
                ModelState::Ready(Mutex::new(model))
            }
            Err(e) => {
                error!(
                    "Failed to load model '{}' for step '{}': {}",
                    descriptor.selector, descriptor.name, e
                );
                ModelState::Disabled(e.to_string())
            }
        };
        Self {
            name: descriptor.name.clone(),
            kind: descriptor.kind.clone(),
            model_name: descriptor.selector.clone(),
            params: descriptor.params.clone(),
            state,
        }
    }

    pub fn load(descriptor: &StepDescriptor, loader: &dyn ModelLoader) -> Self {
        info!("Loading model '{}'...", descriptor.selector);
        Self::new(descriptor, loader.load(&descriptor.selector, &descriptor.params))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.state, ModelState::Disabled(_))
    }
}

impl Step for ModelStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn process(&self, frame: &Frame) -> Result<Option<Frame>, StepError> {
        let model = match &self.state {
            ModelState::Ready(model) => model,
            ModelState::Disabled(reason) => {
                return Err(StepError::Disabled {
                    step: self.name.clone(),
                    reason: reason.clone(),
                })
            }
        };
        let (image, format) = codec::decode(frame.payload())?;
        let output = model
            .lock()
            .map_err(|_| StepError::Execution(format!("model '{}' is poisoned", self.model_name)))?
            .infer(image, &self.params)?;
        Ok(Some(frame.with_payload(codec::encode(&output, format)?)))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Inverts colours; records every prompt and adapter it sees.
    pub struct InvertModel {
        pub prompts: Arc<Mutex<Vec<String>>>,
        pub adapters: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl InferenceModel for InvertModel {
        fn infer(&mut self, mut image: DynamicImage, params: &StepParams) -> Result<DynamicImage, StepError> {
            let prompt = params.str("prompt")?.unwrap_or_default().to_string();
            self.prompts.lock().unwrap().push(prompt);
            image.invert();
            Ok(image)
        }

        fn load_adapter(&mut self, weights: &Path) -> Result<(), StepError> {
            self.adapters.lock().unwrap().push(weights.to_path_buf());
            Ok(())
        }
    }

    /// Knows `invert` (loads) and `broken` (always fails to load).
    #[derive(Default)]
    pub struct StubLoader {
        pub loads: AtomicUsize,
        pub loaded: Mutex<Vec<String>>,
        pub prompts: Arc<Mutex<Vec<String>>>,
        pub adapters: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl StubLoader {
        pub fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl ModelLoader for StubLoader {
        fn provides(&self, model_name: &str) -> bool {
            matches!(model_name, "invert" | "broken") || model_name.starts_with("stabilityai/")
        }

        fn load(&self, model_name: &str, _params: &StepParams) -> Result<Box<dyn InferenceModel>, StepError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.loaded.lock().unwrap().push(model_name.to_string());
            if model_name == "broken" {
                return Err(StepError::ResourceLoad {
                    model: model_name.to_string(),
                    reason: "weights not found".to_string(),
                });
            }
            Ok(Box::new(InvertModel {
                prompts: Arc::clone(&self.prompts),
                adapters: Arc::clone(&self.adapters),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::StubLoader;
    use super::*;
    use crate::common::codec::encoded_test_image;
    use image::{ImageFormat, Rgb, RgbImage};

    #[test]
    fn test_model_step_runs_loaded_model() {
        let loader = StubLoader::default();
        let descriptor =
            StepDescriptor::model("style", "invert", StepParams::new().with("prompt", "night"));
        let step = ModelStep::load(&descriptor, &loader);
        assert!(!step.is_disabled());

        let input = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([10, 0, 255])));
        let frame = Frame::new(codec::encode(&input, ImageFormat::Png).unwrap());
        let output = step.process(&frame).unwrap().unwrap();

        let (decoded, format) = codec::decode(output.payload()).unwrap();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0), &Rgb([245, 255, 0]));
        assert_eq!(*loader.prompts.lock().unwrap(), vec!["night".to_string()]);
    }

    #[test]
    fn test_failed_load_disables_step_without_retrying() {
        let loader = StubLoader::default();
        let descriptor = StepDescriptor::model("style", "broken", StepParams::new());
        let step = ModelStep::load(&descriptor, &loader);
        assert!(step.is_disabled());

        let frame = Frame::new(encoded_test_image(4, 4, ImageFormat::Png));
        for _ in 0..3 {
            assert!(matches!(step.process(&frame), Err(StepError::Disabled { .. })));
        }
        assert_eq!(loader.load_count(), 1);
    }
}
