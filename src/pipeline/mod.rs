pub mod descriptor;
pub mod factory;
pub mod functions;
pub mod offload;
pub mod params;
pub mod pipeline;
pub mod steps;

pub use descriptor::{DescriptorSource, PipelineDescriptor, StepDescriptor};
pub use factory::{StepFactory, StepFactoryBuilder};
pub use functions::{FrameFunction, FunctionRegistry};
pub use offload::WorkerPool;
pub use params::StepParams;
pub use pipeline::Pipeline;
pub use steps::{InferenceModel, ModelLoader, Step};
