use std::sync::Arc;

use super::http_client::HttpClient;
use super::openai::{GOOGLE_OPENAI_BASE_URL, GROQ_BASE_URL, MISTRAL_BASE_URL};
use super::{AnthropicProvider, OpenAiProvider};
use crate::domain::llm::{AiProvider, AiProviderFactory};
use crate::domain::provider::{ProviderApiKey, Providers};
use crate::domain::run_error::ChainError;

/// Factory building HTTP adapters from stored provider credentials
#[derive(Debug, Clone, Default)]
pub struct HttpAiProviderFactory {
    client: HttpClient,
}

impl HttpAiProviderFactory {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn required_url(provider: &ProviderApiKey) -> Result<&str, ChainError> {
        provider.url.as_deref().ok_or_else(|| {
            ChainError::ai_provider_config(format!(
                "Provider {} ({}) requires a base url",
                provider.name, provider.provider
            ))
        })
    }
}

impl AiProviderFactory for HttpAiProviderFactory {
    fn create(&self, provider: &ProviderApiKey) -> Result<Arc<dyn AiProvider>, ChainError> {
        let client = self.client.clone();
        let token = provider.token.as_str();
        let url = provider.url.as_deref();

        let adapter: Arc<dyn AiProvider> = match provider.provider {
            Providers::OpenAi => match url {
                Some(url) => Arc::new(OpenAiProvider::with_base_url(client, token, url)),
                None => Arc::new(OpenAiProvider::new(client, token)),
            },
            Providers::Anthropic => match url {
                Some(url) => Arc::new(AnthropicProvider::with_base_url(client, token, url)),
                None => Arc::new(AnthropicProvider::new(client, token)),
            },
            Providers::Groq => Arc::new(
                OpenAiProvider::with_base_url(client, token, url.unwrap_or(GROQ_BASE_URL))
                    .named("groq"),
            ),
            Providers::Mistral => Arc::new(
                OpenAiProvider::with_base_url(client, token, url.unwrap_or(MISTRAL_BASE_URL))
                    .named("mistral"),
            ),
            Providers::Google => Arc::new(
                OpenAiProvider::with_base_url(client, token, url.unwrap_or(GOOGLE_OPENAI_BASE_URL))
                    .named("google"),
            ),
            Providers::Azure => Arc::new(OpenAiProvider::azure(
                client,
                token,
                Self::required_url(provider)?,
            )),
            Providers::Custom => Arc::new(
                OpenAiProvider::with_base_url(client, token, Self::required_url(provider)?)
                    .named("custom"),
            ),
        };

        Ok(adapter)
    }
}
