use std::time::Duration;
use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Settings Error: {0}")]
    Settings(#[from] config::ConfigError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Engine Error: {0}")]
    Engine(String),
}

// Raised while turning a descriptor into a pipeline. The previously active
// pipeline stays in place whenever one of these is returned.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Unknown step type '{kind}' in step '{step}'")]
    UnknownKind { step: String, kind: String },
    #[error("Unknown function '{function}' in step '{step}'")]
    UnknownFunction { step: String, function: String },
    #[error("Unknown model '{model}' in step '{step}'")]
    UnknownModel { step: String, model: String },
    #[error("Step '{step}' of type '{kind}' names no function or model")]
    MissingSelector { step: String, kind: String },
    #[error("Malformed pipeline descriptor: {0}")]
    Malformed(String),
    #[error("Failed to parse pipeline descriptor: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Failed to read pipeline descriptor '{reference}': {source}")]
    Read {
        reference: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to build pipeline: {0}")]
    Build(String),
}

#[derive(Error, Debug, Clone)]
pub enum StepError {
    #[error("Failed to load model '{model}': {reason}")]
    ResourceLoad { model: String, reason: String },
    #[error("Step '{step}' is disabled: {reason}")]
    Disabled { step: String, reason: String },
    #[error("Failed to decode frame: {0}")]
    Decode(String),
    #[error("Failed to encode frame: {0}")]
    Encode(String),
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter { param: String, reason: String },
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Step execution failed: {0}")]
    Execution(String),
    #[error("Step timed out after {0:?}")]
    Timeout(Duration),
    #[error("Step panicked: {0}")]
    Panicked(String),
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl StepError {
    pub fn invalid_parameter(param: &str, reason: impl Into<String>) -> Self {
        StepError::InvalidParameter {
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

// Per-frame failure while running a pipeline. The frame is dropped.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Step '{step}' produced no output")]
    EmptyOutput { step: String },
    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: StepError,
    },
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
    #[error("The engine control channel is closed.")]
    ChannelClosed,
}
