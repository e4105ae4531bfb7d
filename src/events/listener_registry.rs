//! Named event listeners, in registration order.

use crate::events::{ApplicationEvent, EventListener};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<(String, Arc<dyn EventListener>)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns `false` if `name` is already registered
    pub fn add_listener(&self, name: &str, listener: Arc<dyn EventListener>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|(existing, _)| existing == name) {
            return false;
        }
        listeners.push((name.to_string(), listener));
        debug!(listener = %name, "Registered event listener");
        true
    }

    pub fn remove_listener(&self, name: &str) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| existing != name);
        listeners.len() != before
    }

    /// Deliver to every supporting listener; returns how many received it
    pub fn multicast(&self, event: &ApplicationEvent) -> usize {
        let targets: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, listener)| listener.supports(&event.name))
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &targets {
            listener.on_event(event);
        }
        targets.len()
    }

    pub fn listener_names(&self) -> Vec<String> {
        self.listeners
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listener_names())
            .finish()
    }
}
