//! # Definition Registry Contract
//!
//! The contract the registration pipeline and interceptor registration work
//! against. Name queries return snapshots: descriptors registered after a
//! query stay invisible until the caller queries again.

use crate::constants::attributes;
use crate::error::{ContainerError, ContainerResult};
use crate::events::EventListener;
use crate::lifecycle::LifecycleInterceptor;
use crate::ordering::Priority;
use crate::pipeline::{finalizer_view, FactoryFinalizer, RegistryMutator};
use crate::registry::component::Component;
use crate::registry::descriptor::{Capability, Descriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a registry instance, used by re-entry guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryId(Uuid);

impl RegistryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry-{}", self.0)
    }
}

pub trait DefinitionRegistry: Send + Sync {
    fn registry_id(&self) -> RegistryId;

    // Descriptor storage

    fn register_descriptor(&self, name: &str, descriptor: Descriptor) -> ContainerResult<()>;

    fn contains_descriptor(&self, name: &str) -> bool;

    /// Raw descriptor as registered
    fn descriptor(&self, name: &str) -> ContainerResult<Descriptor>;

    /// Mutate a raw descriptor in place
    fn update_descriptor(
        &self,
        name: &str,
        update: &mut dyn FnMut(&mut Descriptor),
    ) -> ContainerResult<()>;

    /// All descriptor names in registration order
    fn descriptor_names(&self) -> Vec<String>;

    fn descriptor_count(&self) -> usize;

    /// Names whose descriptor declares `capability`, in registration order
    fn names_implementing(&self, capability: Capability) -> Vec<String>;

    /// Capability check against the descriptor; never instantiates
    fn is_capability(&self, name: &str, capability: Capability) -> ContainerResult<bool>;

    fn priority_of(&self, name: &str) -> ContainerResult<Priority>;

    /// Drop cached merged descriptors so later lookups see raw mutations
    fn clear_metadata_cache(&self);

    // Instances

    /// Resolve the instance for `name`, creating and caching singletons
    fn get_component(&self, name: &str) -> ContainerResult<Arc<dyn Component>>;

    /// Run the descriptor's factory without caching or interception
    fn instantiate_detached(&self, name: &str) -> ContainerResult<Arc<dyn Component>>;

    fn contains_instance(&self, name: &str) -> bool;

    /// Create every non-lazy singleton not created yet; returns how many were created
    fn preinstantiate_singletons(&self) -> ContainerResult<usize>;

    // Lifecycle interceptors

    fn interceptor_count(&self) -> usize;

    /// Append an interceptor, first removing any installed interceptor equal to it
    fn install_interceptor(&self, interceptor: Arc<dyn LifecycleInterceptor>);

    fn bulk_install_interceptors(&self, interceptors: Vec<Arc<dyn LifecycleInterceptor>>);

    /// Snapshot of the installed interceptor chain
    fn interceptors(&self) -> Arc<Vec<Arc<dyn LifecycleInterceptor>>>;

    // Provided

    /// Materialize `name` and verify the instance provides `expected`
    fn materialize(&self, name: &str, expected: Capability) -> ContainerResult<Arc<dyn Component>> {
        let component = self.get_component(name)?;
        let provided = match expected {
            Capability::RegistryMutator => component.clone().as_registry_mutator().is_some(),
            Capability::FactoryFinalizer => {
                component.clone().as_factory_finalizer().is_some()
                    || component.clone().as_registry_mutator().is_some()
            }
            Capability::LifecycleInterceptor => {
                component.clone().as_lifecycle_interceptor().is_some()
            }
            Capability::EventListener => component.clone().as_event_listener().is_some(),
        };
        if provided {
            Ok(component)
        } else {
            Err(ContainerError::type_mismatch(name, expected))
        }
    }

    fn materialize_mutator(&self, name: &str) -> ContainerResult<Arc<dyn RegistryMutator>> {
        self.materialize(name, Capability::RegistryMutator)?
            .as_registry_mutator()
            .ok_or_else(|| ContainerError::type_mismatch(name, Capability::RegistryMutator))
    }

    /// Finalizer view of `name`; registry mutators serve through their finalizer hook
    fn materialize_finalizer(&self, name: &str) -> ContainerResult<Arc<dyn FactoryFinalizer>> {
        let component = self.materialize(name, Capability::FactoryFinalizer)?;
        if let Some(finalizer) = component.clone().as_factory_finalizer() {
            return Ok(finalizer);
        }
        component
            .as_registry_mutator()
            .map(finalizer_view)
            .ok_or_else(|| ContainerError::type_mismatch(name, Capability::FactoryFinalizer))
    }

    fn materialize_interceptor(&self, name: &str) -> ContainerResult<Arc<dyn LifecycleInterceptor>> {
        self.materialize(name, Capability::LifecycleInterceptor)?
            .as_lifecycle_interceptor()
            .ok_or_else(|| ContainerError::type_mismatch(name, Capability::LifecycleInterceptor))
    }

    fn materialize_listener(&self, name: &str) -> ContainerResult<Arc<dyn EventListener>> {
        self.materialize(name, Capability::EventListener)?
            .as_event_listener()
            .ok_or_else(|| ContainerError::type_mismatch(name, Capability::EventListener))
    }

    /// Whether factory-method calls of configuration `name` route through the registry
    fn is_enhanced(&self, name: &str) -> ContainerResult<bool> {
        Ok(self.descriptor(name)?.attribute_flag(attributes::ENHANCED))
    }
}
