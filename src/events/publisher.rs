use crate::events::{ApplicationEvent, ListenerRegistry};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Publishes application events to detected listeners and broadcast subscribers
#[derive(Debug, Clone)]
pub struct EventPublisher {
    listeners: Arc<ListenerRegistry>,
    sender: broadcast::Sender<ApplicationEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(listeners: Arc<ListenerRegistry>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { listeners, sender }
    }

    /// Publish an event with the given name and payload; returns how many
    /// registered listeners received it
    pub fn publish(&self, event_name: impl Into<String>, payload: Value) -> usize {
        let event = ApplicationEvent::new(event_name, payload);
        let delivered = self.listeners.multicast(&event);

        // No subscribers is fine: events are published even if nobody listens
        let subscribers = self.sender.send(event.clone()).unwrap_or(0);

        debug!(
            event = %event.name,
            listeners = delivered,
            subscribers = subscribers,
            "Published application event"
        );
        delivered
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ApplicationEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(Arc::new(ListenerRegistry::new()), 1000)
    }
}
