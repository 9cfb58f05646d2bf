use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::events::{Event, EventPublisher, EventSubscriber};

/// Publisher backed by an unbounded channel
///
/// `publish_later` never waits; a dispatcher task fans each event out to the
/// subscribers in registration order.
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    sender: mpsc::UnboundedSender<Event>,
}

/// Background task delivering published events
#[derive(Debug)]
pub struct EventDispatcher {
    handle: JoinHandle<()>,
}

impl EventDispatcher {
    /// Waits until every publisher is dropped and the backlog is delivered
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Event dispatcher stopped abnormally");
        }
    }
}

impl ChannelEventPublisher {
    pub fn start(subscribers: Vec<Arc<dyn EventSubscriber>>) -> (Self, EventDispatcher) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Event>();

        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                for subscriber in &subscribers {
                    debug!(event = event.name(), subscriber = subscriber.name(), "Dispatching event");
                    subscriber.handle(&event).await;
                }
            }
        });

        (Self { sender }, EventDispatcher { handle })
    }
}

impl EventPublisher for ChannelEventPublisher {
    fn publish_later(&self, event: Event) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            warn!(event = name, "Event dropped, dispatcher is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{FinishReason, StreamType};
    use crate::domain::provider_log::fixtures::provider_log_data;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct CollectingSubscriber {
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl EventSubscriber for CollectingSubscriber {
        fn name(&self) -> &'static str {
            "collecting"
        }

        async fn handle(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.name());
        }
    }

    fn call_completed() -> Event {
        Event::AiProviderCallCompleted {
            log: provider_log_data(),
            stream_type: StreamType::Text,
            finish_reason: FinishReason::Stop,
        }
    }

    #[tokio::test]
    async fn test_events_reach_every_subscriber() {
        let first = Arc::new(CollectingSubscriber::default());
        let second = Arc::new(CollectingSubscriber::default());

        let (publisher, dispatcher) =
            ChannelEventPublisher::start(vec![first.clone(), second.clone()]);

        publisher.publish_later(call_completed());
        publisher.publish_later(call_completed());
        drop(publisher);
        dispatcher.join().await;

        assert_eq!(first.seen.lock().unwrap().len(), 2);
        assert_eq!(
            *second.seen.lock().unwrap(),
            vec!["aiProviderCallCompleted", "aiProviderCallCompleted"]
        );
    }

    #[tokio::test]
    async fn test_publish_after_dispatcher_stopped_does_not_panic() {
        let (publisher, dispatcher) = ChannelEventPublisher::start(vec![]);
        dispatcher.handle.abort();
        let _ = dispatcher.handle.await;

        publisher.publish_later(call_completed());
    }
}
