use super::descriptor::PipelineDescriptor;
use super::factory::StepFactory;
use super::offload::WorkerPool;
use super::steps::Step;
use crate::common::Frame;
use crate::error::{ConfigurationError, ExecutionError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// An ordered, immutable run of steps plus the descriptor it was built from.
///
/// Pipelines are never edited in place. Reconfiguring builds a new one and
/// swaps the reference, so a frame in flight always finishes on the pipeline
/// it started with.
pub struct Pipeline {
    descriptor: PipelineDescriptor,
    steps: Vec<Arc<dyn Step>>,
}

impl Pipeline {
    pub fn configure(
        factory: &StepFactory,
        descriptor: PipelineDescriptor,
    ) -> Result<Self, ConfigurationError> {
        let steps = descriptor
            .steps
            .iter()
            .map(|step| factory.create_step(step))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Configured pipeline '{}' with {} steps",
            descriptor.name.as_deref().unwrap_or("unnamed"),
            steps.len()
        );
        Ok(Self { descriptor, steps })
    }

    pub fn configuration(&self) -> &PipelineDescriptor {
        &self.descriptor
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.name())
    }

    pub async fn run(&self, frame: Frame, pool: &mut WorkerPool) -> Result<Frame, ExecutionError> {
        let mut current = frame;
        for step in &self.steps {
            let start = Instant::now();
            debug!("Processing step: {}", step.name());
            let output = pool
                .execute(Arc::clone(step), current)
                .await
                .map_err(|source| ExecutionError::Step {
                    step: step.name().to_string(),
                    source,
                })?;
            debug!(
                "Step '{}' finished in {}us",
                step.name(),
                start.elapsed().as_micros()
            );
            current = output.ok_or_else(|| ExecutionError::EmptyOutput {
                step: step.name().to_string(),
            })?;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.descriptor.name)
            .field("steps", &self.step_names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::codec::{self, encoded_test_image};
    use crate::error::StepError;
    use crate::pipeline::descriptor::StepDescriptor;
    use crate::pipeline::functions::image_ops;
    use crate::pipeline::params::StepParams;
    use image::{GenericImageView, ImageFormat};
    use serde_json::json;
    use std::time::Duration;

    fn pool() -> WorkerPool {
        WorkerPool::new(2, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_resize_then_enhance_matches_manual_composition() {
        let descriptor = PipelineDescriptor::from_yaml(
            r#"
steps:
  - name: resize
    type: function
    function: resize_image
    params:
      size: [256, 256]
  - name: enhance
    type: function
    function: enhance_image
    params:
      factor: 2.0
"#,
        )
        .unwrap();
        let pipeline = Pipeline::configure(&StepFactory::default(), descriptor).unwrap();
        let frame = Frame::new(encoded_test_image(640, 480, ImageFormat::Png));

        let output = pipeline.run(frame.clone(), &mut pool()).await.unwrap();

        let resized = image_ops::resize_image(&frame, &StepParams::new().with("size", json!([256, 256])))
            .unwrap()
            .unwrap();
        let expected = image_ops::enhance_image(&resized, &StepParams::new().with("factor", 2.0))
            .unwrap()
            .unwrap();
        assert_eq!(output.payload(), expected.payload());
        assert_eq!(output.id(), frame.id());

        let (image, _) = codec::decode(output.payload()).unwrap();
        assert_eq!(image.dimensions(), (256, 256));
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_identity() {
        let pipeline = Pipeline::configure(&StepFactory::default(), PipelineDescriptor::default()).unwrap();
        assert!(pipeline.is_empty());
        let frame = Frame::new(vec![1, 2, 3]);
        let output = pipeline.run(frame.clone(), &mut pool()).await.unwrap();
        assert_eq!(output.payload(), frame.payload());
    }

    #[test]
    fn test_unknown_function_fails_whole_configuration() {
        let descriptor = PipelineDescriptor::new(vec![
            StepDescriptor::function("resize", "resize_image", StepParams::new()),
            StepDescriptor::function("blur", "gaussian_blur", StepParams::new()),
        ]);
        let result = Pipeline::configure(&StepFactory::default(), descriptor);
        assert!(matches!(result, Err(ConfigurationError::UnknownFunction { .. })));
    }

    #[tokio::test]
    async fn test_empty_result_stops_the_pipeline() {
        let factory = StepFactory::builder()
            .function("discard", |_: &Frame, _: &StepParams| Ok(None))
            .function("fail", |_: &Frame, _: &StepParams| {
                Err(StepError::Execution("must not run".to_string()))
            })
            .build();
        let descriptor = PipelineDescriptor::new(vec![
            StepDescriptor::function("discard", "discard", StepParams::new()),
            StepDescriptor::function("fail", "fail", StepParams::new()),
        ]);
        let pipeline = Pipeline::configure(&factory, descriptor).unwrap();

        let result = pipeline.run(Frame::new(vec![0]), &mut pool()).await;
        assert!(matches!(result, Err(ExecutionError::EmptyOutput { ref step }) if step == "discard"));
    }

    #[tokio::test]
    async fn test_step_error_names_the_failing_step() {
        let descriptor = PipelineDescriptor::new(vec![StepDescriptor::function(
            "enhance",
            "enhance_image",
            StepParams::new().with("factor", 2.0),
        )]);
        let pipeline = Pipeline::configure(&StepFactory::default(), descriptor).unwrap();

        let result = pipeline.run(Frame::new(b"not an image".to_vec()), &mut pool()).await;
        assert!(matches!(
            result,
            Err(ExecutionError::Step { ref step, source: StepError::Decode(_) }) if step == "enhance"
        ));
    }
}
