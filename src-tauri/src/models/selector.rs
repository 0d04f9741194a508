use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid model selector '{0}', expected '<modelId>:<parameterSize>'")]
pub struct SelectorError(pub String);

/// Identifies one variant of one model, written `modelId:parameterSize`.
///
/// This is also the name the model service uses for a downloaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelSelector {
    pub model_id: String,
    pub parameter_size: String,
}

impl ModelSelector {
    pub fn new(model_id: impl Into<String>, parameter_size: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            parameter_size: parameter_size.into(),
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model_id, self.parameter_size)
    }
}

impl FromStr for ModelSelector {
    type Err = SelectorError;

    /// Splits on the first colon.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((model_id, parameter_size))
                if !model_id.is_empty() && !parameter_size.is_empty() =>
            {
                Ok(Self::new(model_id, parameter_size))
            }
            _ => Err(SelectorError(s.to_string())),
        }
    }
}

impl TryFrom<String> for ModelSelector {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelSelector> for String {
    fn from(selector: ModelSelector) -> Self {
        selector.to_string()
    }
}
