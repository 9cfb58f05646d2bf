use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Message;
use crate::domain::run_error::ChainError;

/// Resolved configuration of one chain step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, alias = "maxTokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PromptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Shallow merge: every field set in `overrides` wins
    pub fn merged_with(&self, overrides: &PromptConfig) -> PromptConfig {
        let mut extra = self.extra.clone();
        extra.extend(overrides.extra.clone());

        PromptConfig {
            provider: overrides.provider.clone().or_else(|| self.provider.clone()),
            model: overrides.model.clone().or_else(|| self.model.clone()),
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            output: overrides.output.clone().or_else(|| self.output.clone()),
            schema: overrides.schema.clone().or_else(|| self.schema.clone()),
            extra,
        }
    }

    /// Resolves the requested output shape
    ///
    /// Only text and object generation are supported; any other shape is an
    /// adapter contract violation.
    pub fn output_mode(&self) -> Result<OutputMode, ChainError> {
        match self.output.as_deref() {
            None | Some("text") => Ok(OutputMode::Text),
            Some("object") => Ok(OutputMode::Object {
                schema: self.schema.clone(),
            }),
            Some(other) => Err(ChainError::unsupported_response_type(other)),
        }
    }
}

/// Output shape requested from the provider
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMode {
    Text,
    Object { schema: Option<Value> },
}

impl OutputMode {
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object { .. })
    }
}

/// One streaming call to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct AiRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub output: OutputMode,
}

impl AiRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            output: OutputMode::Text,
        }
    }

    pub fn with_config(mut self, config: &PromptConfig, output: OutputMode) -> Self {
        self.temperature = config.temperature;
        self.max_tokens = config.max_tokens;
        self.output = output;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run_error::RunErrorCode;
    use serde_json::json;

    #[test]
    fn test_overrides_win_and_keep_unset_fields() {
        let base = PromptConfig::new()
            .with_provider("openai")
            .with_model("gpt-4o")
            .with_temperature(0.2);
        let overrides = PromptConfig::new()
            .with_output("object")
            .with_schema(json!({"type": "object"}));

        let merged = base.merged_with(&overrides);

        assert_eq!(merged.provider.as_deref(), Some("openai"));
        assert_eq!(merged.model.as_deref(), Some("gpt-4o"));
        assert_eq!(merged.temperature, Some(0.2));
        assert_eq!(merged.output.as_deref(), Some("object"));
        assert!(merged.schema.is_some());
    }

    #[test]
    fn test_extra_attributes_are_flattened() {
        let config: PromptConfig =
            serde_json::from_value(json!({"model": "gpt-4o", "maxTokens": 20, "top_p": 0.5}))
                .unwrap();

        assert_eq!(config.max_tokens, Some(20));
        assert_eq!(config.extra.get("top_p"), Some(&json!(0.5)));
    }

    #[test]
    fn test_output_mode() {
        assert_eq!(PromptConfig::new().output_mode().unwrap(), OutputMode::Text);
        assert!(
            PromptConfig::new()
                .with_output("object")
                .output_mode()
                .unwrap()
                .is_object()
        );

        let error = PromptConfig::new()
            .with_output("array")
            .output_mode()
            .unwrap_err();
        assert_eq!(error.code(), RunErrorCode::UnsupportedProviderResponseTypeError);
    }
}
