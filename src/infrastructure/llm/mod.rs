//! LLM provider implementations

mod anthropic;
mod factory;
mod http_client;
mod openai;
mod sse;

pub use anthropic::AnthropicProvider;
pub use factory::HttpAiProviderFactory;
pub use http_client::{ByteStream, HttpClient, HttpClientTrait};
pub use openai::{OpenAiAuth, OpenAiProvider};
pub use sse::{SseDecoder, SseEvent};
