use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::llm::{Message, PromptConfig};

/// Messages and resolved configuration of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
    pub config: PromptConfig,
}

impl Conversation {
    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Marks the terminal step
    pub completed: bool,
    pub conversation: Conversation,
}

/// Failure raised while compiling the next step
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub code: String,
    pub message: String,
}

impl CompileError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A compiled, single-pass chain
///
/// Each call to `step` advances the chain; it cannot be rewound.
#[async_trait]
pub trait StepSource: Send {
    /// Produces the next step, feeding it the previous step's response
    async fn step(&mut self, last_response: Option<&str>) -> Result<StepResult, CompileError>;

    fn raw_text(&self) -> &str;
}

/// One step of a [`CompiledPrompt`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledStep {
    pub messages: Vec<Message>,
    /// Attributes overriding the prompt configuration for this step
    #[serde(default)]
    pub config: Option<PromptConfig>,
}

/// A prompt already compiled into its steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPrompt {
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub config: PromptConfig,
    pub steps: Vec<CompiledStep>,
}

/// Replays a [`CompiledPrompt`], growing the conversation step by step
#[derive(Debug)]
pub struct StaticChain {
    prompt: CompiledPrompt,
    position: usize,
    messages: Vec<Message>,
}

impl StaticChain {
    pub fn new(prompt: CompiledPrompt) -> Self {
        Self {
            prompt,
            position: 0,
            messages: Vec::new(),
        }
    }
}

#[async_trait]
impl StepSource for StaticChain {
    async fn step(&mut self, last_response: Option<&str>) -> Result<StepResult, CompileError> {
        if self.prompt.steps.is_empty() {
            return Err(CompileError::new("empty-chain", "Chain has no steps"));
        }

        let Some(step) = self.prompt.steps.get(self.position) else {
            return Err(CompileError::new(
                "chain-completed",
                "Chain has already completed",
            ));
        };

        if let Some(response) = last_response {
            self.messages.push(Message::assistant(response));
        }
        self.messages.extend(step.messages.iter().cloned());

        let config = match &step.config {
            Some(overrides) => self.prompt.config.merged_with(overrides),
            None => self.prompt.config.clone(),
        };

        self.position += 1;

        Ok(StepResult {
            completed: self.position == self.prompt.steps.len(),
            conversation: Conversation {
                messages: self.messages.clone(),
                config,
            },
        })
    }

    fn raw_text(&self) -> &str {
        &self.prompt.raw_text
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MessageRole;

    fn two_steps() -> CompiledPrompt {
        CompiledPrompt {
            raw_text: "---\nmodel: gpt-4o\n---\nHello".to_string(),
            config: PromptConfig::new().with_provider("openai").with_model("gpt-4o"),
            steps: vec![
                CompiledStep {
                    messages: vec![Message::system("Be brief"), Message::user("Hello")],
                    config: None,
                },
                CompiledStep {
                    messages: vec![Message::user("Again")],
                    config: Some(PromptConfig::new().with_model("gpt-4o-mini")),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_steps_accumulate_the_conversation() {
        let mut chain = StaticChain::new(two_steps());

        let first = chain.step(None).await.unwrap();
        assert!(!first.completed);
        assert_eq!(first.conversation.messages.len(), 2);

        let second = chain.step(Some("Hi!")).await.unwrap();
        assert!(second.completed);

        let roles: Vec<_> = second.conversation.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
        assert_eq!(second.conversation.config.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(second.conversation.config.provider.as_deref(), Some("openai"));
    }

    #[tokio::test]
    async fn test_chain_is_single_pass() {
        let mut chain = StaticChain::new(two_steps());
        chain.step(None).await.unwrap();
        chain.step(Some("Hi!")).await.unwrap();

        let error = chain.step(Some("done")).await.unwrap_err();
        assert_eq!(error.code, "chain-completed");
    }

    #[tokio::test]
    async fn test_empty_chain_fails_to_compile() {
        let mut chain = StaticChain::new(CompiledPrompt {
            raw_text: String::new(),
            config: PromptConfig::new(),
            steps: vec![],
        });

        let error = chain.step(None).await.unwrap_err();
        assert_eq!(error.code, "empty-chain");
    }

    #[test]
    fn test_compiled_prompt_from_json() {
        let json = r#"{
            "config": {"provider": "openai", "model": "gpt-4o"},
            "steps": [{"messages": [{"role": "user", "content": "Hello"}]}]
        }"#;

        let prompt: CompiledPrompt = serde_json::from_str(json).unwrap();
        assert_eq!(prompt.steps.len(), 1);
        assert!(prompt.raw_text.is_empty());
    }
}
