use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::llm::{FinishReason, Message, PromptConfig, ToolCall};
use crate::domain::run_error::RunErrorCode;

/// Partial output of a run, delivered while it is in flight
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChainEvent {
    StepStarted {
        step: usize,
        messages: Vec<Message>,
        config: PromptConfig,
    },
    TextDelta {
        step: usize,
        delta: String,
    },
    ToolCall {
        step: usize,
        tool_call: ToolCall,
    },
    StepCompleted {
        step: usize,
        finish_reason: FinishReason,
        provider_log_uuid: Uuid,
    },
    Error {
        code: RunErrorCode,
        message: String,
    },
    Completed {
        errorable_uuid: Uuid,
    },
}

/// Sending half of a run's event stream
///
/// Sends never block; events are dropped once the caller stops listening.
#[derive(Debug, Clone)]
pub struct ChainEventSink {
    sender: mpsc::UnboundedSender<ChainEvent>,
}

impl ChainEventSink {
    pub fn new(sender: mpsc::UnboundedSender<ChainEvent>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn send(&self, event: ChainEvent) {
        let _ = self.sender.send(event);
    }
}
