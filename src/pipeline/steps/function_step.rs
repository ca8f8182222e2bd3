use super::Step;
use crate::common::Frame;
use crate::error::{ConfigurationError, StepError};
use crate::pipeline::descriptor::StepDescriptor;
use crate::pipeline::functions::{FrameFunction, FunctionRegistry};
use crate::pipeline::params::StepParams;

/// Step backed by a named function from the [`FunctionRegistry`].
pub struct FunctionStep {
    name: String,
    kind: String,
    function_name: String,
    params: StepParams,
    function: FrameFunction,
}

impl FunctionStep {
    pub fn from_descriptor(
        descriptor: &StepDescriptor,
        functions: &FunctionRegistry,
    ) -> Result<Self, ConfigurationError> {
        let function = functions.resolve(&descriptor.selector).ok_or_else(|| {
            ConfigurationError::UnknownFunction {
                step: descriptor.name.clone(),
                function: descriptor.selector.clone(),
            }
        })?;
        Ok(Self {
            name: descriptor.name.clone(),
            kind: descriptor.kind.clone(),
            function_name: descriptor.selector.clone(),
            params: descriptor.params.clone(),
            function,
        })
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }
}

impl Step for FunctionStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn process(&self, frame: &Frame) -> Result<Option<Frame>, StepError> {
        (self.function)(frame, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_function_is_a_configuration_error() {
        let descriptor = StepDescriptor::function("blur", "gaussian_blur", StepParams::new());
        let result = FunctionStep::from_descriptor(&descriptor, &FunctionRegistry::with_builtins());
        assert!(matches!(
            result,
            Err(ConfigurationError::UnknownFunction { ref function, .. }) if function == "gaussian_blur"
        ));
    }

    #[test]
    fn test_params_are_passed_to_the_function() {
        let mut functions = FunctionRegistry::new();
        functions.register_external("append", |frame: &Frame, params: &StepParams| {
            let suffix = params.str("suffix")?.unwrap_or_default();
            let mut payload = frame.payload().to_vec();
            payload.extend_from_slice(suffix.as_bytes());
            Ok(Some(frame.with_payload(payload)))
        });
        let descriptor =
            StepDescriptor::function("tag", "append", StepParams::new().with("suffix", "!"));

        let step = FunctionStep::from_descriptor(&descriptor, &functions).unwrap();
        let output = step.process(&Frame::new(b"hi".to_vec())).unwrap().unwrap();
        assert_eq!(output.payload(), b"hi!");
        assert_eq!(step.name(), "tag");
        assert_eq!(step.function_name(), "append");
    }
}
