use tracing::debug;

use super::{Conversation, StepSource};
use crate::domain::llm::PromptConfig;
use crate::domain::provider::{ProviderApiKey, ProvidersMap};
use crate::domain::quota::ProviderQuotaGuard;
use crate::domain::run_error::ChainError;
use crate::domain::workspace::Workspace;
use crate::domain::DomainError;

const PROVIDER_REQUIRED_MESSAGE: &str = "\"provider\" attribute is required";

/// A step that passed validation and may be dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedStep {
    pub completed: bool,
    pub conversation: Conversation,
    pub provider: ProviderApiKey,
}

/// Input of [`ChainValidator::call`]
pub struct ValidateStep<'a> {
    pub chain: &'a mut dyn StepSource,
    pub last_response: Option<&'a str>,
    pub workspace: &'a Workspace,
    pub providers_map: &'a ProvidersMap,
    pub config_overrides: Option<&'a PromptConfig>,
}

/// Pulls the next step and checks it can be sent to a provider
#[derive(Debug, Clone)]
pub struct ChainValidator {
    quota: ProviderQuotaGuard,
    default_provider_api_key: Option<String>,
}

impl ChainValidator {
    pub fn new(quota: ProviderQuotaGuard) -> Self {
        Self {
            quota,
            default_provider_api_key: None,
        }
    }

    /// Token of the platform's shared credential, subject to the free quota
    pub fn with_default_provider_api_key(mut self, token: impl Into<String>) -> Self {
        self.default_provider_api_key = Some(token.into());
        self
    }

    /// Pulls the next step and validates it
    ///
    /// The inner error is a recoverable run error; the outer one means the
    /// quota cache could not be reached.
    pub async fn call(
        &self,
        input: ValidateStep<'_>,
    ) -> Result<Result<ValidatedStep, ChainError>, DomainError> {
        let workspace = input.workspace;
        let validated = match Self::resolve(input).await {
            Ok(validated) => validated,
            Err(e) => return Ok(Err(e)),
        };

        if let Err(e) = self
            .quota
            .check(
                workspace,
                &validated.provider,
                self.default_provider_api_key.as_deref(),
            )
            .await?
        {
            return Ok(Err(e));
        }

        debug!(
            workspace_id = workspace.id,
            provider = %validated.provider.name,
            completed = validated.completed,
            "Chain step validated"
        );

        Ok(Ok(validated))
    }

    async fn resolve(input: ValidateStep<'_>) -> Result<ValidatedStep, ChainError> {
        let ValidateStep {
            chain,
            last_response,
            workspace: _,
            providers_map,
            config_overrides,
        } = input;

        let step = chain
            .step(last_response)
            .await
            .map_err(|e| ChainError::chain_compile(e.code, e.message))?;

        let mut conversation = step.conversation;
        if let Some(overrides) = config_overrides {
            conversation.config = conversation.config.merged_with(overrides);
        }

        if conversation.config.model.is_none() {
            return Err(ChainError::model_required());
        }

        let provider_name = conversation
            .config
            .provider
            .as_deref()
            .ok_or_else(|| ChainError::document_config(PROVIDER_REQUIRED_MESSAGE))?;

        let provider = providers_map
            .get(provider_name)
            .ok_or_else(|| ChainError::missing_provider(provider_name))?;

        if provider.provider.requires_user_message() && !conversation.has_user_message() {
            return Err(ChainError::ai_provider_config(format!(
                "{} provider requires at least one user message",
                capitalize(provider.provider.as_str())
            )));
        }

        Ok(ValidatedStep {
            completed: step.completed,
            provider: provider.clone(),
            conversation,
        })
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
