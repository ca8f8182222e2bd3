//! Declarative pipeline descriptors and their YAML text form.
//!
//! ```yaml
//! pipeline_name: demo
//! steps:
//!   - name: resize
//!     type: function
//!     function: resize_image
//!     params:
//!       size: [256, 256]
//!   - name: stylize
//!     type: model
//!     model_name: custom_lora_model
//!     params:
//!       prompt: "a watercolor painting"
//! ```
//!
//! A bare list of step records is accepted as well.

use super::params::StepParams;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

pub const FUNCTION_KIND: &str = "function";
pub const MODEL_KIND: &str = "model";

/// One pipeline stage as written by the operator. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StepRecord", into = "StepRecord")]
pub struct StepDescriptor {
    pub name: String,
    pub kind: String,
    /// Function name for `function` steps, model name otherwise.
    pub selector: String,
    pub params: StepParams,
}

impl StepDescriptor {
    pub fn function(name: impl Into<String>, function: impl Into<String>, params: StepParams) -> Self {
        Self {
            name: name.into(),
            kind: FUNCTION_KIND.to_string(),
            selector: function.into(),
            params,
        }
    }

    pub fn model(name: impl Into<String>, model_name: impl Into<String>, params: StepParams) -> Self {
        Self {
            name: name.into(),
            kind: MODEL_KIND.to_string(),
            selector: model_name.into(),
            params,
        }
    }
}

// Wire shape of a step record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StepRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_name: Option<String>,
    #[serde(default, skip_serializing_if = "StepParams::is_empty")]
    params: StepParams,
}

impl TryFrom<StepRecord> for StepDescriptor {
    type Error = ConfigurationError;

    fn try_from(record: StepRecord) -> Result<Self, Self::Error> {
        let selector = if record.kind == FUNCTION_KIND {
            record.function
        } else {
            record.model_name.or(record.function)
        };
        let selector = selector.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
            ConfigurationError::MissingSelector {
                step: record.name.clone().unwrap_or_default(),
                kind: record.kind.clone(),
            }
        })?;
        if record.kind.trim().is_empty() {
            return Err(ConfigurationError::Malformed(format!(
                "step '{selector}' has an empty type"
            )));
        }
        Ok(Self {
            name: record
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| selector.clone()),
            kind: record.kind,
            selector,
            params: record.params,
        })
    }
}

impl From<StepDescriptor> for StepRecord {
    fn from(descriptor: StepDescriptor) -> Self {
        let (function, model_name) = if descriptor.kind == FUNCTION_KIND {
            (Some(descriptor.selector), None)
        } else {
            (None, Some(descriptor.selector))
        };
        Self {
            name: Some(descriptor.name),
            kind: descriptor.kind,
            function,
            model_name,
            params: descriptor.params,
        }
    }
}

/// The full configuration a pipeline is built from; kept as the snapshot that
/// `get_pipeline` returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    #[serde(rename = "pipeline_name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepDescriptor>,
}

impl PipelineDescriptor {
    pub fn new(steps: Vec<StepDescriptor>) -> Self {
        Self { name: None, steps }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigurationError> {
        if text.trim().is_empty() {
            return Err(ConfigurationError::Malformed(
                "the pipeline descriptor is empty".to_string(),
            ));
        }
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        match document {
            serde_yaml::Value::Sequence(_) => Ok(Self::new(serde_yaml::from_value(document)?)),
            serde_yaml::Value::Mapping(_) => Ok(serde_yaml::from_value(document)?),
            serde_yaml::Value::Null => Err(ConfigurationError::Malformed(
                "the pipeline descriptor is empty".to_string(),
            )),
            _ => Err(ConfigurationError::Malformed(
                "expected a list of steps or a mapping with a 'steps' key".to_string(),
            )),
        }
    }

    pub fn to_yaml(&self) -> Result<String, ConfigurationError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Where a `SET_PIPELINE` request takes its descriptor from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorSource {
    Inline(String),
    /// A reference resolved by the engine's descriptor store.
    Stored(String),
}
