//! # Component Descriptors
//!
//! A descriptor is the pre-instantiation record of a component: its type,
//! the processor and interceptor capabilities its instance will expose, its
//! declared priority, and an attribute bag for facts derived during
//! registry processing.

use crate::error::ContainerResult;
use crate::ordering::{Ordered, Priority};
use crate::registry::component::Component;
use crate::registry::definition_registry::DefinitionRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Processor or interceptor interface a component instance provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// May add or alter descriptors before any regular instantiation
    RegistryMutator,
    /// Observes or adjusts the finalized registry
    FactoryFinalizer,
    /// Per-instance hooks around creation
    LifecycleInterceptor,
    /// Receives published application events
    EventListener,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryMutator => write!(f, "registry_mutator"),
            Self::FactoryFinalizer => write!(f, "factory_finalizer"),
            Self::LifecycleInterceptor => write!(f, "lifecycle_interceptor"),
            Self::EventListener => write!(f, "event_listener"),
        }
    }
}

/// Who a component exists for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Application,
    /// Container plumbing; exempt from early-instance advisories
    Infrastructure,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Singleton,
    Prototype,
}

/// Creates a component instance from its descriptor
pub type ComponentFactory =
    Arc<dyn Fn(&FactoryContext<'_>) -> ContainerResult<Arc<dyn Component>> + Send + Sync>;

/// Wrap a closure as a [`ComponentFactory`]
pub fn factory<F>(f: F) -> ComponentFactory
where
    F: Fn(&FactoryContext<'_>) -> ContainerResult<Arc<dyn Component>> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone, Default)]
pub struct Descriptor {
    type_name: String,
    capabilities: BTreeSet<Capability>,
    priority: Priority,
    role: Role,
    scope: Scope,
    lazy_init: bool,
    parent: Option<String>,
    factory_owner: Option<String>,
    factory_method: Option<String>,
    attributes: Map<String, Value>,
    factory: Option<ComponentFactory>,
}

impl Descriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Declare a capability. Registry mutators are always factory finalizers too.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        if capability == Capability::RegistryMutator {
            self.capabilities.insert(Capability::FactoryFinalizer);
        }
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_lazy_init(mut self, lazy_init: bool) -> Self {
        self.lazy_init = lazy_init;
        self
    }

    /// Inherit unset properties from another descriptor
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Mark this descriptor as produced by a factory method of `owner`
    pub fn with_factory_method(mut self, owner: impl Into<String>, method: impl Into<String>) -> Self {
        self.factory_owner = Some(owner.into());
        self.factory_method = Some(method.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_factory<F>(mut self, f: F) -> Self
    where
        F: Fn(&FactoryContext<'_>) -> ContainerResult<Arc<dyn Component>> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(f));
        self
    }

    pub fn with_component_factory(mut self, factory: ComponentFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_infrastructure_capable(&self) -> bool {
        self.has_capability(Capability::RegistryMutator)
            || self.has_capability(Capability::FactoryFinalizer)
            || self.has_capability(Capability::LifecycleInterceptor)
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn factory_owner(&self) -> Option<&str> {
        self.factory_owner.as_deref()
    }

    pub fn factory_method(&self) -> Option<&str> {
        self.factory_method.as_deref()
    }

    pub fn factory(&self) -> Option<&ComponentFactory> {
        self.factory.as_ref()
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn attribute_flag(&self, key: &str) -> bool {
        self.attributes
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn set_lazy_init(&mut self, lazy_init: bool) {
        self.lazy_init = lazy_init;
    }

    /// Overlay this descriptor on its resolved parent
    pub(crate) fn merged_onto(&self, parent: &Descriptor) -> Descriptor {
        let mut merged = parent.clone();
        merged.parent = None;
        if !self.type_name.is_empty() {
            merged.type_name = self.type_name.clone();
        }
        merged.capabilities.extend(self.capabilities.iter().copied());
        if self.priority != Priority::Unordered {
            merged.priority = self.priority;
        }
        merged.role = self.role;
        merged.scope = self.scope;
        merged.lazy_init = self.lazy_init;
        merged.factory_owner = self.factory_owner.clone().or(merged.factory_owner);
        merged.factory_method = self.factory_method.clone().or(merged.factory_method);
        for (key, value) in &self.attributes {
            merged.attributes.insert(key.clone(), value.clone());
        }
        if self.factory.is_some() {
            merged.factory = self.factory.clone();
        }
        merged
    }
}

impl Ordered for Descriptor {
    fn priority(&self) -> Priority {
        self.priority
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .field("priority", &self.priority)
            .field("role", &self.role)
            .field("scope", &self.scope)
            .field("lazy_init", &self.lazy_init)
            .field("parent", &self.parent)
            .field("factory_owner", &self.factory_owner)
            .field("factory_method", &self.factory_method)
            .field("attributes", &self.attributes)
            .field("factory", &self.factory.as_ref().map(|_| "ComponentFactory"))
            .finish()
    }
}

/// What a [`ComponentFactory`] sees while creating an instance
pub struct FactoryContext<'a> {
    registry: &'a dyn DefinitionRegistry,
    name: &'a str,
    descriptor: &'a Descriptor,
}

impl<'a> FactoryContext<'a> {
    pub fn new(registry: &'a dyn DefinitionRegistry, name: &'a str, descriptor: &'a Descriptor) -> Self {
        Self {
            registry,
            name,
            descriptor,
        }
    }

    pub fn registry(&self) -> &'a dyn DefinitionRegistry {
        self.registry
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn descriptor(&self) -> &'a Descriptor {
        self.descriptor
    }

    /// Resolve another component while creating this one.
    ///
    /// A factory method of a full (enhanced) configuration that asks for a
    /// sibling factory method's product receives the registry's canonical
    /// singleton. In a lite configuration the sibling factory is invoked
    /// directly and every call yields a fresh instance. Everything else
    /// resolves through the registry.
    pub fn dependency(&self, name: &str) -> ContainerResult<Arc<dyn Component>> {
        if let Some(owner) = self.descriptor.factory_owner() {
            let dependency = self.registry.descriptor(name)?;
            if dependency.factory_owner() == Some(owner) && !self.registry.is_enhanced(owner)? {
                return self.registry.instantiate_detached(name);
            }
        }
        self.registry.get_component(name)
    }

    /// [`dependency`](Self::dependency) downcast to a concrete type
    pub fn dependency_as<T: Component>(&self, name: &str) -> ContainerResult<Arc<T>> {
        let component = self.dependency(name)?;
        crate::registry::component::downcast_component::<T>(component)
            .ok_or_else(|| crate::error::ContainerError::type_mismatch(name, std::any::type_name::<T>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::attributes;

    #[test]
    fn test_registry_mutator_implies_factory_finalizer() {
        let descriptor = Descriptor::new("app.Mutator").with_capability(Capability::RegistryMutator);
        assert!(descriptor.has_capability(Capability::FactoryFinalizer));
        assert!(descriptor.is_infrastructure_capable());
    }

    #[test]
    fn test_attribute_bag() {
        let mut descriptor = Descriptor::new("app.Config")
            .with_attribute(attributes::CONFIGURATION_CLASS, attributes::CONFIGURATION_FULL);
        descriptor.set_attribute(attributes::ENHANCED, true);

        assert_eq!(
            descriptor.attribute_str(attributes::CONFIGURATION_CLASS),
            Some("full")
        );
        assert!(descriptor.attribute_flag(attributes::ENHANCED));
        assert!(!descriptor.attribute_flag(attributes::PRESERVE_TARGET_TYPE));
        assert!(descriptor.remove_attribute(attributes::ENHANCED).is_some());
    }

    #[test]
    fn test_merge_overlays_child_on_parent() {
        let parent = Descriptor::new("app.Base")
            .with_capability(Capability::EventListener)
            .with_priority(Priority::Ordered(10))
            .with_attribute("region", "eu");
        let child = Descriptor::new("")
            .with_parent("base")
            .with_capability(Capability::LifecycleInterceptor)
            .with_attribute("tier", "gold");

        let merged = child.merged_onto(&parent);

        assert_eq!(merged.type_name(), "app.Base");
        assert!(merged.has_capability(Capability::EventListener));
        assert!(merged.has_capability(Capability::LifecycleInterceptor));
        assert_eq!(merged.priority(), Priority::Ordered(10));
        assert_eq!(merged.attribute_str("region"), Some("eu"));
        assert_eq!(merged.attribute_str("tier"), Some("gold"));
        assert!(merged.parent().is_none());
    }
}
