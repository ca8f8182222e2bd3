use crate::buffer::OverflowPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "LIVEPIPE";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub buffer: BufferSettings,
    pub engine: EngineSettings,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    pub capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// How long the loop sleeps when the input buffer is empty.
    pub idle_poll_interval_ms: u64,
    /// Upper bound on steps executing at once on the blocking pool.
    pub worker_threads: usize,
    pub step_timeout_ms: u64,
    pub pipeline_path: Option<PathBuf>,
    pub pipeline_enabled: bool,
    pub control_capacity: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            buffer: BufferSettings::default(),
            engine: EngineSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            capacity: 100,
            overflow_policy: OverflowPolicy::DropNewest,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            idle_poll_interval_ms: 10,
            worker_threads: 4,
            step_timeout_ms: 5_000,
            pipeline_path: Some(PathBuf::from("configs/default_pipeline.yaml")),
            pipeline_enabled: true,
            control_capacity: 32,
        }
    }
}

impl EngineSettings {
    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms.max(1))
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

impl Configuration {
    /// Layer defaults, an optional settings file and `LIVEPIPE__*` environment
    /// variables, in that order.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
