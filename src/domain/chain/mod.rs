//! Chain domain - The chain run pipeline
//!
//! A run pulls steps from a compiled chain, validates each one, streams the
//! provider call, persists a provider log per call, and settles with either
//! the final response or exactly one typed run error.

mod event;
mod processor;
mod runner;
pub mod step;
mod stream_consumer;
mod validator;

pub use event::{ChainEvent, ChainEventSink};
pub use processor::{ProcessedResponse, ProviderProcessor};
pub use runner::{ChainOutput, ChainResponse, ChainRun, ChainRunner, RunChain, RunResponse};
pub use step::{
    CompileError, CompiledPrompt, CompiledStep, Conversation, StaticChain, StepResult, StepSource,
};
pub use stream_consumer::{consume_stream, StreamConsumedResult};
pub use validator::{ChainValidator, ValidateStep, ValidatedStep};
