use futures::StreamExt;
use tracing::{debug, warn};

use super::{ChainEvent, ChainEventSink};
use crate::domain::llm::{AiStream, AiStreamEvent, FinishReason, StreamAccumulator};
use crate::domain::run_error::ChainError;

/// Outcome of draining a provider stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConsumedResult {
    pub finish_reason: FinishReason,
    pub error: Option<ChainError>,
}

impl StreamConsumedResult {
    pub fn finished(finish_reason: FinishReason) -> Self {
        Self {
            finish_reason,
            error: None,
        }
    }

    pub fn failed(error: ChainError) -> Self {
        Self {
            finish_reason: FinishReason::Error,
            error: Some(error),
        }
    }
}

/// Drains `stream` in arrival order, forwarding deltas to `sink`
///
/// Never fails: stream errors are captured in the returned result. A stream
/// that ends without a finish event finishes with `stop`.
pub async fn consume_stream(
    mut stream: AiStream,
    sink: &ChainEventSink,
    step: usize,
) -> (StreamConsumedResult, StreamAccumulator) {
    let mut accumulator = StreamAccumulator::new();
    let mut finish_reason = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(AiStreamEvent::TextDelta(delta)) => {
                accumulator.text.push_str(&delta);
                sink.send(ChainEvent::TextDelta { step, delta });
            }
            Ok(AiStreamEvent::ToolCall(tool_call)) => {
                accumulator.tool_calls.push(tool_call.clone());
                sink.send(ChainEvent::ToolCall { step, tool_call });
            }
            Ok(AiStreamEvent::Usage(usage)) => accumulator.usage = usage,
            // Usage may still trail the finish event
            Ok(AiStreamEvent::Finish { finish_reason: reason }) => finish_reason = Some(reason),
            Ok(AiStreamEvent::Error(error)) | Err(error) => {
                warn!(step, error = %error, "AI stream failed");
                return (
                    StreamConsumedResult::failed(ChainError::from(error)),
                    accumulator,
                );
            }
        }
    }

    let finish_reason = finish_reason.unwrap_or(FinishReason::Stop);
    debug!(step, %finish_reason, "AI stream consumed");

    (StreamConsumedResult::finished(finish_reason), accumulator)
}
