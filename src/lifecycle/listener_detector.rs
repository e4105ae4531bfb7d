//! Registers singleton event listeners as they are created.

use crate::error::ContainerResult;
use crate::events::ListenerRegistry;
use crate::lifecycle::{CreationContext, LifecycleInterceptor};
use crate::registry::{Component, Descriptor};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const DETECTOR_KEY: &str = "ListenerDetector";

/// Always installed last so it sees fully wrapped instances. All detectors
/// compare equal, so the chain holds at most one.
pub struct ListenerDetector {
    listeners: Arc<ListenerRegistry>,
    singleton_names: DashMap<String, bool>,
}

impl ListenerDetector {
    pub fn new(listeners: Arc<ListenerRegistry>) -> Self {
        Self {
            listeners,
            singleton_names: DashMap::new(),
        }
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }
}

impl LifecycleInterceptor for ListenerDetector {
    fn name(&self) -> &str {
        DETECTOR_KEY
    }

    fn is_merged_definition_aware(&self) -> bool {
        true
    }

    fn on_merged_descriptor(&self, name: &str, descriptor: &Descriptor) -> ContainerResult<()> {
        self.singleton_names
            .insert(name.to_string(), descriptor.is_singleton());
        Ok(())
    }

    fn after_initialization(
        &self,
        instance: Arc<dyn Component>,
        context: &CreationContext,
    ) -> ContainerResult<Arc<dyn Component>> {
        let Some(listener) = instance.clone().as_event_listener() else {
            return Ok(instance);
        };

        match self.singleton_names.get(&context.name).map(|entry| *entry.value()) {
            Some(true) => {
                if self.listeners.add_listener(&context.name, listener) {
                    debug!(listener = %context.name, "Detected event listener");
                }
            }
            Some(false) => {
                warn!(
                    component = %context.name,
                    "Component implements the event listener role but is not a singleton; it will not be registered as a listener"
                );
                self.singleton_names.remove(&context.name);
            }
            None => {}
        }
        Ok(instance)
    }

    fn dedup_key(&self) -> Option<&str> {
        Some(DETECTOR_KEY)
    }
}

impl std::fmt::Debug for ListenerDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerDetector")
            .field("listeners", &self.listeners)
            .finish()
    }
}
