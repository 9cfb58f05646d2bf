use std::fmt::Debug;

use async_trait::async_trait;

use super::Event;

/// Outbound event channel
///
/// Delivery is at-least-once and best-effort: `publish_later` never blocks
/// and never fails the caller, and ordering relative to persistence writes
/// is not guaranteed.
pub trait EventPublisher: Send + Sync + Debug {
    fn publish_later(&self, event: Event);
}

/// Consumer of published events
#[async_trait]
pub trait EventSubscriber: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &Event);
}
