//! # Application Events
//!
//! Listeners detected during component creation receive events published
//! through the [`EventPublisher`]. Async consumers can also subscribe to
//! the publisher's broadcast channel.

pub mod listener_registry;
pub mod publisher;

pub use listener_registry::ListenerRegistry;
pub use publisher::EventPublisher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event delivered to listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEvent {
    pub name: String,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl ApplicationEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            published_at: Utc::now(),
        }
    }
}

pub trait EventListener: Send + Sync {
    /// Whether this listener wants events with `event_name`
    fn supports(&self, _event_name: &str) -> bool {
        true
    }

    fn on_event(&self, event: &ApplicationEvent);
}
