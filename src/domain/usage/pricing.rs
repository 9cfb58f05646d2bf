//! Model pricing and cost estimation

use serde::{Deserialize, Serialize};

use crate::domain::llm::Usage;
use crate::domain::provider::Providers;

/// Micro-dollars per millicent
const MICROS_PER_MILLICENT: u64 = 10;

/// Pricing configuration for a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub provider: Providers,
    pub model_id: String,
    /// Price per 1K input tokens in micro-dollars
    pub input_price_per_1k_micros: u64,
    /// Price per 1K output tokens in micro-dollars
    pub output_price_per_1k_micros: u64,
}

impl ModelPricing {
    pub fn new(
        provider: Providers,
        model_id: impl Into<String>,
        input_price_per_1k_micros: u64,
        output_price_per_1k_micros: u64,
    ) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            input_price_per_1k_micros,
            output_price_per_1k_micros,
        }
    }

    /// Cost in integer millicents, floored
    pub fn cost_in_millicents(&self, usage: &Usage) -> u64 {
        let micros_x1000 = usage.prompt_tokens as u64 * self.input_price_per_1k_micros
            + usage.completion_tokens as u64 * self.output_price_per_1k_micros;

        micros_x1000 / (1000 * MICROS_PER_MILLICENT)
    }
}

/// Built-in price table
pub fn default_model_pricing() -> Vec<ModelPricing> {
    use Providers::*;

    vec![
        ModelPricing::new(OpenAi, "gpt-4o", 5_000, 15_000),
        ModelPricing::new(OpenAi, "gpt-4o-mini", 150, 600),
        ModelPricing::new(OpenAi, "gpt-4-turbo", 10_000, 30_000),
        ModelPricing::new(OpenAi, "gpt-4", 30_000, 60_000),
        ModelPricing::new(OpenAi, "gpt-3.5-turbo", 500, 1_500),
        ModelPricing::new(OpenAi, "o1-preview", 15_000, 60_000),
        ModelPricing::new(OpenAi, "o1-mini", 3_000, 12_000),
        ModelPricing::new(Azure, "gpt-4o", 5_000, 15_000),
        ModelPricing::new(Azure, "gpt-4o-mini", 150, 600),
        ModelPricing::new(Azure, "gpt-35-turbo", 500, 1_500),
        ModelPricing::new(Anthropic, "claude-3-5-sonnet", 3_000, 15_000),
        ModelPricing::new(Anthropic, "claude-3-opus", 15_000, 75_000),
        ModelPricing::new(Anthropic, "claude-3-sonnet", 3_000, 15_000),
        ModelPricing::new(Anthropic, "claude-3-haiku", 250, 1_250),
        ModelPricing::new(Groq, "llama-3.1-70b-versatile", 590, 790),
        ModelPricing::new(Groq, "llama-3.1-8b-instant", 50, 80),
        ModelPricing::new(Groq, "mixtral-8x7b-32768", 240, 240),
        ModelPricing::new(Mistral, "mistral-large-latest", 2_000, 6_000),
        ModelPricing::new(Mistral, "mistral-small-latest", 200, 600),
        ModelPricing::new(Mistral, "open-mistral-nemo", 150, 150),
        ModelPricing::new(Google, "gemini-1.5-pro", 3_500, 10_500),
        ModelPricing::new(Google, "gemini-1.5-flash", 75, 300),
    ]
}

/// Finds the price entry for a model
///
/// Exact ids win; otherwise the longest id that prefixes `model` is used so
/// dated snapshots (`gpt-4o-2024-08-06`) resolve to their family.
pub fn find_pricing<'a>(
    table: &'a [ModelPricing],
    provider: Providers,
    model: &str,
) -> Option<&'a ModelPricing> {
    let candidates = table.iter().filter(|p| p.provider == provider);

    candidates
        .filter(|p| model == p.model_id || model.starts_with(&p.model_id))
        .max_by_key(|p| p.model_id.len())
}

/// Estimates the cost of a call in millicents; unknown models cost 0
pub fn estimate_cost(provider: Providers, model: &str, usage: &Usage) -> u64 {
    let table = default_model_pricing();

    find_pricing(&table, provider, model)
        .map(|pricing| pricing.cost_in_millicents(usage))
        .unwrap_or(0)
}
