// Recording processors, interceptors and listeners.
//
// Journal entry formats:
//   mutate:<label>            registry mutation hook
//   finalize:<label>          factory finalizer hook
//   before:<label>:<name>     before-initialization hook
//   after:<label>:<name>      after-initialization hook
//   merged:<label>:<name>     merged descriptor callback
//   event:<label>:<event>     event delivered to a listener

use crate::error::ContainerResult;
use crate::events::{ApplicationEvent, EventListener};
use crate::lifecycle::{CreationContext, LifecycleInterceptor};
use crate::ordering::Priority;
use crate::pipeline::{FactoryFinalizer, RegistryMutator};
use crate::registry::{Capability, Component, DefinitionRegistry, Descriptor};
use crate::test_helpers::Journal;
use std::any::Any;
use std::sync::Arc;

fn singleton_descriptor<C: Component>(
    type_name: &str,
    instance: &Arc<C>,
    capability: Capability,
    priority: Priority,
) -> Descriptor {
    let instance = Arc::clone(instance);
    Descriptor::new(type_name)
        .with_capability(capability)
        .with_priority(priority)
        .with_factory(move |_| Ok(Arc::clone(&instance) as Arc<dyn Component>))
}

/// Registry mutator that only records its hooks
pub struct RecordingMutator {
    label: String,
    journal: Journal,
}

impl RecordingMutator {
    pub fn new(label: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            journal: journal.clone(),
        })
    }

    pub fn descriptor(self: &Arc<Self>, priority: Priority) -> Descriptor {
        singleton_descriptor("test.RecordingMutator", self, Capability::RegistryMutator, priority)
    }
}

impl FactoryFinalizer for RecordingMutator {
    fn processor_name(&self) -> &str {
        &self.label
    }

    fn finalize_factory(&self, _registry: &dyn DefinitionRegistry) -> ContainerResult<()> {
        self.journal.record(format!("finalize:{}", self.label));
        Ok(())
    }
}

impl RegistryMutator for RecordingMutator {
    fn mutate_registry(&self, _registry: &dyn DefinitionRegistry) -> ContainerResult<()> {
        self.journal.record(format!("mutate:{}", self.label));
        Ok(())
    }
}

impl Component for RecordingMutator {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn as_registry_mutator(self: Arc<Self>) -> Option<Arc<dyn RegistryMutator>> {
        Some(self)
    }
}

/// Registry mutator that registers further descriptors from its hook
pub struct SpawningMutator {
    label: String,
    journal: Journal,
    spawns: Vec<(String, Descriptor)>,
}

impl SpawningMutator {
    pub fn new(label: impl Into<String>, journal: &Journal, spawns: Vec<(String, Descriptor)>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            journal: journal.clone(),
            spawns,
        })
    }

    pub fn descriptor(self: &Arc<Self>, priority: Priority) -> Descriptor {
        singleton_descriptor("test.SpawningMutator", self, Capability::RegistryMutator, priority)
    }
}

impl FactoryFinalizer for SpawningMutator {
    fn processor_name(&self) -> &str {
        &self.label
    }

    fn finalize_factory(&self, _registry: &dyn DefinitionRegistry) -> ContainerResult<()> {
        self.journal.record(format!("finalize:{}", self.label));
        Ok(())
    }
}

impl RegistryMutator for SpawningMutator {
    fn mutate_registry(&self, registry: &dyn DefinitionRegistry) -> ContainerResult<()> {
        self.journal.record(format!("mutate:{}", self.label));
        for (name, descriptor) in &self.spawns {
            if !registry.contains_descriptor(name) {
                registry.register_descriptor(name, descriptor.clone())?;
            }
        }
        Ok(())
    }
}

impl Component for SpawningMutator {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn as_registry_mutator(self: Arc<Self>) -> Option<Arc<dyn RegistryMutator>> {
        Some(self)
    }
}

/// Plain factory finalizer
pub struct RecordingFinalizer {
    label: String,
    journal: Journal,
}

impl RecordingFinalizer {
    pub fn new(label: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            journal: journal.clone(),
        })
    }

    pub fn descriptor(self: &Arc<Self>, priority: Priority) -> Descriptor {
        singleton_descriptor("test.RecordingFinalizer", self, Capability::FactoryFinalizer, priority)
    }
}

impl FactoryFinalizer for RecordingFinalizer {
    fn processor_name(&self) -> &str {
        &self.label
    }

    fn finalize_factory(&self, _registry: &dyn DefinitionRegistry) -> ContainerResult<()> {
        self.journal.record(format!("finalize:{}", self.label));
        Ok(())
    }
}

impl Component for RecordingFinalizer {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn as_factory_finalizer(self: Arc<Self>) -> Option<Arc<dyn FactoryFinalizer>> {
        Some(self)
    }
}

/// Lifecycle interceptor recording every hook it sees
pub struct RecordingInterceptor {
    label: String,
    journal: Journal,
    merged_aware: bool,
}

impl RecordingInterceptor {
    pub fn new(label: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            journal: journal.clone(),
            merged_aware: false,
        })
    }

    /// Interceptor that also wants merged descriptors
    pub fn merged_aware(label: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            journal: journal.clone(),
            merged_aware: true,
        })
    }

    pub fn descriptor(self: &Arc<Self>, priority: Priority) -> Descriptor {
        singleton_descriptor("test.RecordingInterceptor", self, Capability::LifecycleInterceptor, priority)
    }
}

impl LifecycleInterceptor for RecordingInterceptor {
    fn name(&self) -> &str {
        &self.label
    }

    fn before_initialization(
        &self,
        instance: Arc<dyn Component>,
        context: &CreationContext,
    ) -> ContainerResult<Arc<dyn Component>> {
        self.journal.record(format!("before:{}:{}", self.label, context.name));
        Ok(instance)
    }

    fn after_initialization(
        &self,
        instance: Arc<dyn Component>,
        context: &CreationContext,
    ) -> ContainerResult<Arc<dyn Component>> {
        self.journal.record(format!("after:{}:{}", self.label, context.name));
        Ok(instance)
    }

    fn is_merged_definition_aware(&self) -> bool {
        self.merged_aware
    }

    fn on_merged_descriptor(&self, name: &str, _descriptor: &Descriptor) -> ContainerResult<()> {
        self.journal.record(format!("merged:{}:{name}", self.label));
        Ok(())
    }
}

impl Component for RecordingInterceptor {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn as_lifecycle_interceptor(self: Arc<Self>) -> Option<Arc<dyn LifecycleInterceptor>> {
        Some(self)
    }
}

/// Event listener recording the events it receives
pub struct RecordingListener {
    label: String,
    journal: Journal,
    event_prefix: Option<String>,
}

impl RecordingListener {
    pub fn new(label: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            journal: journal.clone(),
            event_prefix: None,
        })
    }

    /// Listener that only supports events whose name starts with `prefix`
    pub fn for_prefix(label: impl Into<String>, journal: &Journal, prefix: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            journal: journal.clone(),
            event_prefix: Some(prefix.into()),
        })
    }

    pub fn descriptor(self: &Arc<Self>) -> Descriptor {
        singleton_descriptor("test.RecordingListener", self, Capability::EventListener, Priority::Unordered)
    }
}

impl EventListener for RecordingListener {
    fn supports(&self, event_name: &str) -> bool {
        self.event_prefix
            .as_deref()
            .map_or(true, |prefix| event_name.starts_with(prefix))
    }

    fn on_event(&self, event: &ApplicationEvent) {
        self.journal.record(format!("event:{}:{}", self.label, event.name));
    }
}

impl Component for RecordingListener {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn as_event_listener(self: Arc<Self>) -> Option<Arc<dyn EventListener>> {
        Some(self)
    }
}
