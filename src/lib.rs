pub mod buffer;
pub mod common;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod plugins;

pub use buffer::{FrameBuffer, IngestRouter, OverflowPolicy};
pub use common::Frame;
pub use crate::config::Configuration;
pub use engine::{ControlHandle, Engine, EngineBuilder};
pub use error::{AppError, ConfigurationError, ControlError, ExecutionError, StepError};
pub use pipeline::{DescriptorSource, Pipeline, PipelineDescriptor, StepFactory};
