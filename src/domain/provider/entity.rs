use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported AI provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Providers {
    OpenAi,
    Anthropic,
    Groq,
    Mistral,
    Azure,
    Google,
    Custom,
}

impl Providers {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Groq => "groq",
            Self::Mistral => "mistral",
            Self::Azure => "azure",
            Self::Google => "google",
            Self::Custom => "custom",
        }
    }

    /// Providers that reject conversations without a user-authored message
    pub fn requires_user_message(&self) -> bool {
        matches!(self, Self::Google)
    }
}

impl std::fmt::Display for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Providers {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "groq" => Ok(Self::Groq),
            "mistral" => Ok(Self::Mistral),
            "azure" => Ok(Self::Azure),
            "google" => Ok(Self::Google),
            "custom" => Ok(Self::Custom),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// A workspace-scoped AI provider credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderApiKey {
    pub id: i64,
    pub workspace_id: i64,
    pub provider: Providers,
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ProviderApiKey {
    pub fn new(
        id: i64,
        workspace_id: i64,
        provider: Providers,
        name: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            id,
            workspace_id,
            provider,
            name: name.into(),
            token: token.into(),
            url: None,
            last_used_at: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Name-keyed lookup of a workspace's provider credentials
pub type ProvidersMap = HashMap<String, ProviderApiKey>;

pub fn build_providers_map(keys: Vec<ProviderApiKey>) -> ProvidersMap {
    keys.into_iter().map(|key| (key.name.clone(), key)).collect()
}
