//! LLM domain - Messages, provider adapters and the AI invoker

mod invoker;
mod message;
pub mod provider;
mod request;
mod response;

pub use invoker::{AiCall, AiInvoker, StreamAccumulator};
pub use message::{Message, MessageRole};
pub use provider::{AiProvider, AiProviderFactory, AiStream, ProviderCallError};
pub use request::{AiRequest, OutputMode, PromptConfig};
pub use response::{
    AiResult, AiStreamEvent, FinishReason, ObjectOutput, StreamType, TextOutput, ToolCall, Usage,
};
