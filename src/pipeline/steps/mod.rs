pub mod function_step;
pub mod model_step;

pub use function_step::FunctionStep;
pub use model_step::{InferenceModel, ModelLoader, ModelStep};

use crate::common::Frame;
use crate::error::StepError;

/// A single-frame transform.
///
/// `Ok(None)` means the step could not produce a usable output for this
/// input; the pipeline drops the frame rather than passing the input along.
/// `process` may block, so callers run it on the worker pool.
pub trait Step: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> &str;
    fn process(&self, frame: &Frame) -> Result<Option<Frame>, StepError>;
}
