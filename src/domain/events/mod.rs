//! Events domain - Fire-and-forget notifications for observability subscribers

mod event;
mod publisher;

pub use event::{DocumentRunData, EvaluationResultCreatedData, EvaluationRunData, Event};
pub use publisher::{EventPublisher, EventSubscriber};

#[cfg(test)]
pub use publisher::mock::RecordingPublisher;
