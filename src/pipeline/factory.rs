use super::descriptor::{StepDescriptor, FUNCTION_KIND, MODEL_KIND};
use super::functions::FunctionRegistry;
use super::params::StepParams;
use super::steps::{FunctionStep, ModelLoader, ModelStep, Step};
use crate::common::Frame;
use crate::error::{ConfigurationError, StepError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Builds one step from its descriptor. Registered per kind tag, or per model
/// selector for the `model` kind.
pub type StepConstructor = Arc<
    dyn Fn(&StepDescriptor, &StepFactory) -> Result<Arc<dyn Step>, ConfigurationError> + Send + Sync,
>;

/// Tagged dispatch table from descriptor to step.
///
/// Built once at startup through [`StepFactoryBuilder`] and immutable after
/// that, so it can be shared freely behind an `Arc`.
pub struct StepFactory {
    kinds: HashMap<String, StepConstructor>,
    models: HashMap<String, StepConstructor>,
    functions: FunctionRegistry,
    model_loader: Option<Arc<dyn ModelLoader>>,
}

impl StepFactory {
    pub fn builder() -> StepFactoryBuilder {
        StepFactoryBuilder::new()
    }

    pub fn create_step(&self, descriptor: &StepDescriptor) -> Result<Arc<dyn Step>, ConfigurationError> {
        let constructor =
            self.kinds
                .get(&descriptor.kind)
                .ok_or_else(|| ConfigurationError::UnknownKind {
                    step: descriptor.name.clone(),
                    kind: descriptor.kind.clone(),
                })?;
        let step = constructor(descriptor, self)?;
        info!("Created {} step '{}'", descriptor.kind, descriptor.name);
        Ok(step)
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn model_loader(&self) -> Option<&dyn ModelLoader> {
        self.model_loader.as_deref()
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.kinds.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn model_selectors(&self) -> Vec<String> {
        let mut selectors: Vec<String> = self.models.keys().cloned().collect();
        selectors.sort();
        selectors
    }
}

impl Default for StepFactory {
    fn default() -> Self {
        StepFactoryBuilder::new().build()
    }
}

fn build_function_step(
    descriptor: &StepDescriptor,
    factory: &StepFactory,
) -> Result<Arc<dyn Step>, ConfigurationError> {
    Ok(Arc::new(FunctionStep::from_descriptor(descriptor, factory.functions())?))
}

// Specialised selectors win; anything else must be a model the runtime knows.
fn build_model_step(
    descriptor: &StepDescriptor,
    factory: &StepFactory,
) -> Result<Arc<dyn Step>, ConfigurationError> {
    if let Some(constructor) = factory.models.get(&descriptor.selector) {
        return constructor(descriptor, factory);
    }
    match factory.model_loader() {
        Some(loader) if loader.provides(&descriptor.selector) => {
            Ok(Arc::new(ModelStep::load(descriptor, loader)))
        }
        _ => Err(ConfigurationError::UnknownModel {
            step: descriptor.name.clone(),
            model: descriptor.selector.clone(),
        }),
    }
}

pub struct StepFactoryBuilder {
    kinds: HashMap<String, StepConstructor>,
    models: HashMap<String, StepConstructor>,
    functions: FunctionRegistry,
    model_loader: Option<Arc<dyn ModelLoader>>,
}

impl StepFactoryBuilder {
    pub fn new() -> Self {
        let mut kinds: HashMap<String, StepConstructor> = HashMap::new();
        kinds.insert(FUNCTION_KIND.to_string(), Arc::new(build_function_step));
        kinds.insert(MODEL_KIND.to_string(), Arc::new(build_model_step));
        Self {
            kinds,
            models: HashMap::new(),
            functions: FunctionRegistry::with_builtins(),
            model_loader: None,
        }
    }

    // Registers a new step kind tag, this will override an existing tag.
    pub fn kind<F>(mut self, tag: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&StepDescriptor, &StepFactory) -> Result<Arc<dyn Step>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.kinds.insert(tag.into(), Arc::new(constructor));
        self
    }

    // Registers a specialised model step for one model selector.
    pub fn model<F>(mut self, selector: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&StepDescriptor, &StepFactory) -> Result<Arc<dyn Step>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.models.insert(selector.into(), Arc::new(constructor));
        self
    }

    // Registers an external function, shadowing a built-in of the same name.
    pub fn function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Frame, &StepParams) -> Result<Option<Frame>, StepError> + Send + Sync + 'static,
    {
        self.functions.register_external(name, function);
        self
    }

    pub fn model_loader(mut self, loader: Arc<dyn ModelLoader>) -> Self {
        self.model_loader = Some(loader);
        self
    }

    pub fn build(self) -> StepFactory {
        StepFactory {
            kinds: self.kinds,
            models: self.models,
            functions: self.functions,
            model_loader: self.model_loader,
        }
    }
}

impl Default for StepFactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
