use crate::error::StepError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keyword arguments handed to a step, in the order they were written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepParams(IndexMap<String, Value>);

impl StepParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn f64(&self, key: &str) -> Result<Option<f64>, StepError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| StepError::invalid_parameter(key, "expected a number")),
        }
    }

    pub fn require_f64(&self, key: &str) -> Result<f64, StepError> {
        self.f64(key)?
            .ok_or_else(|| StepError::invalid_parameter(key, "missing"))
    }

    pub fn str(&self, key: &str) -> Result<Option<&str>, StepError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(StepError::invalid_parameter(key, "expected a string")),
        }
    }

    /// A `[width, height]` pair or a `{width, height}` mapping.
    pub fn require_size(&self, key: &str) -> Result<(u32, u32), StepError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| StepError::invalid_parameter(key, "missing"))?;
        let (width, height) = match value {
            Value::Array(items) if items.len() == 2 => (&items[0], &items[1]),
            Value::Object(map) => match (map.get("width"), map.get("height")) {
                (Some(w), Some(h)) => (w, h),
                _ => return Err(StepError::invalid_parameter(key, "expected width and height")),
            },
            _ => return Err(StepError::invalid_parameter(key, "expected [width, height]")),
        };
        let dimension = |v: &Value| {
            v.as_u64()
                .filter(|d| *d > 0 && *d <= u32::MAX as u64)
                .map(|d| d as u32)
                .ok_or_else(|| StepError::invalid_parameter(key, "dimensions must be positive integers"))
        };
        Ok((dimension(width)?, dimension(height)?))
    }
}
