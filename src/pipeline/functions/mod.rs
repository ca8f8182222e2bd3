pub mod image_ops;

use crate::common::Frame;
use crate::error::StepError;
use crate::pipeline::params::StepParams;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A named frame transform: `function(frame, **params)`.
pub type FrameFunction =
    Arc<dyn Fn(&Frame, &StepParams) -> Result<Option<Frame>, StepError> + Send + Sync>;

/// Built-in and externally supplied functions. External entries shadow
/// built-ins of the same name.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    builtin: HashMap<String, FrameFunction>,
    external: HashMap<String, FrameFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtin("resize_image", image_ops::resize_image);
        registry.register_builtin("resize", image_ops::resize_image);
        registry.register_builtin("enhance_image", image_ops::enhance_image);
        registry.register_builtin("enhance", image_ops::enhance_image);
        registry
    }

    pub fn register_builtin<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&Frame, &StepParams) -> Result<Option<Frame>, StepError> + Send + Sync + 'static,
    {
        self.builtin.insert(name.into(), Arc::new(function));
    }

    pub fn register_external<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&Frame, &StepParams) -> Result<Option<Frame>, StepError> + Send + Sync + 'static,
    {
        self.external.insert(name.into(), Arc::new(function));
    }

    pub fn resolve(&self, name: &str) -> Option<FrameFunction> {
        if let Some(function) = self.external.get(name) {
            debug!("Using custom function '{}'", name);
            return Some(Arc::clone(function));
        }
        self.builtin.get(name).map(|function| {
            debug!("Using default function '{}'", name);
            Arc::clone(function)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.external.contains_key(name) || self.builtin.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .builtin
            .keys()
            .chain(self.external.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
