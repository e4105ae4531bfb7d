//! # Default Component Registry
//!
//! In-memory [`DefinitionRegistry`] holding descriptors in registration
//! order, cached singletons, merged-descriptor metadata, and the installed
//! lifecycle interceptor chain.

use crate::error::{ContainerError, ContainerResult};
use crate::lifecycle::{CreationContext, LifecycleInterceptor};
use crate::ordering::Priority;
use crate::registry::component::Component;
use crate::registry::definition_registry::{DefinitionRegistry, RegistryId};
use crate::registry::descriptor::{Capability, Descriptor, FactoryContext};
use crate::registry::interceptor_chain::InterceptorChain;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct DescriptorStore {
    order: Vec<String>,
    by_name: HashMap<String, Descriptor>,
}

/// Registry statistics for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub descriptor_count: usize,
    pub singleton_count: usize,
    pub interceptor_count: usize,
    pub merged_cache_size: usize,
}

pub struct DefaultComponentRegistry {
    id: RegistryId,
    descriptors: RwLock<DescriptorStore>,
    merged: DashMap<String, Descriptor>,
    singletons: DashMap<String, Arc<dyn Component>>,
    in_creation: Mutex<HashSet<String>>,
    interceptors: InterceptorChain,
    allow_definition_overriding: bool,
}

/// Clears the in-creation marker when creation finishes or fails
struct CreationGuard<'a> {
    in_creation: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.in_creation.lock().remove(&self.name);
    }
}

impl DefaultComponentRegistry {
    pub fn new() -> Self {
        Self {
            id: RegistryId::new(),
            descriptors: RwLock::new(DescriptorStore::default()),
            merged: DashMap::new(),
            singletons: DashMap::new(),
            in_creation: Mutex::new(HashSet::new()),
            interceptors: InterceptorChain::new(),
            allow_definition_overriding: false,
        }
    }

    /// Allow re-registering an existing name, replacing its descriptor
    pub fn with_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = allow;
        self
    }

    /// Register an already created instance under `name`
    pub fn register_singleton(&self, name: &str, instance: Arc<dyn Component>) -> ContainerResult<()> {
        if self.singletons.contains_key(name) {
            return Err(ContainerError::DuplicateDefinition {
                name: name.to_string(),
            });
        }
        self.singletons.insert(name.to_string(), instance);
        debug!(name = %name, "Registered singleton instance");
        Ok(())
    }

    /// Descriptor with its parent chain resolved, cached until the metadata cache is cleared
    pub fn merged_descriptor(&self, name: &str) -> ContainerResult<Descriptor> {
        if let Some(cached) = self.merged.get(name) {
            return Ok(cached.value().clone());
        }

        let raw = self.descriptor(name)?;
        let merged = match raw.parent() {
            Some(parent) if parent == name => {
                return Err(ContainerError::creation_failed(
                    name,
                    "descriptor names itself as parent",
                ))
            }
            Some(parent) => {
                let parent = self.merged_descriptor(parent)?;
                raw.merged_onto(&parent)
            }
            None => raw,
        };

        self.merged.insert(name.to_string(), merged.clone());
        Ok(merged)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            descriptor_count: self.descriptor_count(),
            singleton_count: self.singletons.len(),
            interceptor_count: self.interceptors.len(),
            merged_cache_size: self.merged.len(),
        }
    }

    pub fn interceptor_names(&self) -> Vec<String> {
        self.interceptors.names()
    }

    fn begin_creation(&self, name: &str) -> ContainerResult<CreationGuard<'_>> {
        let mut in_creation = self.in_creation.lock();
        if !in_creation.insert(name.to_string()) {
            return Err(ContainerError::CircularReference {
                name: name.to_string(),
            });
        }
        Ok(CreationGuard {
            in_creation: &self.in_creation,
            name: name.to_string(),
        })
    }

    fn instantiate(&self, name: &str, descriptor: &Descriptor) -> ContainerResult<Arc<dyn Component>> {
        let factory = descriptor
            .factory()
            .cloned()
            .ok_or_else(|| ContainerError::creation_failed(name, "descriptor declares no factory"))?;
        let context = FactoryContext::new(self, name, descriptor);
        (factory.as_ref())(&context)
    }

    fn create_component(&self, name: &str, descriptor: &Descriptor) -> ContainerResult<Arc<dyn Component>> {
        let mut instance = self.instantiate(name, descriptor)?;

        let chain = self.interceptors.snapshot();
        let context = CreationContext {
            name: name.to_string(),
            type_name: descriptor.type_name().to_string(),
            role: descriptor.role(),
            installed_interceptors: chain.len(),
        };

        for interceptor in chain.iter().filter(|i| i.is_merged_definition_aware()) {
            interceptor.on_merged_descriptor(name, descriptor)?;
        }
        for interceptor in chain.iter() {
            instance = interceptor.before_initialization(instance, &context)?;
        }
        instance.initialize()?;
        for interceptor in chain.iter() {
            instance = interceptor.after_initialization(instance, &context)?;
        }

        Ok(instance)
    }
}

impl Default for DefaultComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefaultComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultComponentRegistry")
            .field("id", &self.id)
            .field("stats", &self.stats())
            .finish()
    }
}

impl DefinitionRegistry for DefaultComponentRegistry {
    fn registry_id(&self) -> RegistryId {
        self.id
    }

    fn register_descriptor(&self, name: &str, descriptor: Descriptor) -> ContainerResult<()> {
        {
            let mut store = self.descriptors.write();
            if store.by_name.contains_key(name) {
                if !self.allow_definition_overriding {
                    return Err(ContainerError::DuplicateDefinition {
                        name: name.to_string(),
                    });
                }
                debug!(name = %name, "Overriding component descriptor");
            } else {
                store.order.push(name.to_string());
            }
            store.by_name.insert(name.to_string(), descriptor);
        }
        self.merged.clear();

        debug!(name = %name, "Registered component descriptor");
        Ok(())
    }

    fn contains_descriptor(&self, name: &str) -> bool {
        self.descriptors.read().by_name.contains_key(name)
    }

    fn descriptor(&self, name: &str) -> ContainerResult<Descriptor> {
        self.descriptors
            .read()
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::not_found(name))
    }

    fn update_descriptor(
        &self,
        name: &str,
        update: &mut dyn FnMut(&mut Descriptor),
    ) -> ContainerResult<()> {
        {
            let mut store = self.descriptors.write();
            let descriptor = store
                .by_name
                .get_mut(name)
                .ok_or_else(|| ContainerError::not_found(name))?;
            update(descriptor);
        }
        self.merged.clear();
        Ok(())
    }

    fn descriptor_names(&self) -> Vec<String> {
        self.descriptors.read().order.clone()
    }

    fn descriptor_count(&self) -> usize {
        self.descriptors.read().order.len()
    }

    fn names_implementing(&self, capability: Capability) -> Vec<String> {
        self.descriptor_names()
            .into_iter()
            .filter(|name| {
                self.merged_descriptor(name)
                    .map(|descriptor| descriptor.has_capability(capability))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn is_capability(&self, name: &str, capability: Capability) -> ContainerResult<bool> {
        Ok(self.merged_descriptor(name)?.has_capability(capability))
    }

    fn priority_of(&self, name: &str) -> ContainerResult<Priority> {
        Ok(self.merged_descriptor(name)?.priority())
    }

    fn clear_metadata_cache(&self) {
        let cleared = self.merged.len();
        self.merged.clear();
        debug!(cleared = cleared, "Cleared merged descriptor cache");
    }

    fn get_component(&self, name: &str) -> ContainerResult<Arc<dyn Component>> {
        if let Some(existing) = self.singletons.get(name) {
            return Ok(Arc::clone(existing.value()));
        }

        let descriptor = self.merged_descriptor(name)?;
        let _creation = self.begin_creation(name)?;
        let instance = self.create_component(name, &descriptor)?;

        if !descriptor.is_singleton() {
            return Ok(instance);
        }

        let cached = self
            .singletons
            .entry(name.to_string())
            .or_insert(instance)
            .value()
            .clone();
        debug!(
            name = %name,
            type_name = %descriptor.type_name(),
            "Created singleton component"
        );
        Ok(cached)
    }

    fn instantiate_detached(&self, name: &str) -> ContainerResult<Arc<dyn Component>> {
        let descriptor = self.merged_descriptor(name)?;
        self.instantiate(name, &descriptor)
    }

    fn contains_instance(&self, name: &str) -> bool {
        self.singletons.contains_key(name)
    }

    fn preinstantiate_singletons(&self) -> ContainerResult<usize> {
        let mut created = 0;
        for name in self.descriptor_names() {
            if self.contains_instance(&name) {
                continue;
            }
            let descriptor = self.merged_descriptor(&name)?;
            if descriptor.is_singleton() && !descriptor.is_lazy_init() && descriptor.factory().is_some() {
                self.get_component(&name)?;
                created += 1;
            }
        }

        info!(
            created = created,
            total_singletons = self.singletons.len(),
            "Pre-instantiated singletons"
        );
        Ok(created)
    }

    fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    fn install_interceptor(&self, interceptor: Arc<dyn LifecycleInterceptor>) {
        debug!(interceptor = %interceptor.name(), "Installing lifecycle interceptor");
        self.interceptors.install(interceptor);
    }

    fn bulk_install_interceptors(&self, interceptors: Vec<Arc<dyn LifecycleInterceptor>>) {
        debug!(count = interceptors.len(), "Installing lifecycle interceptors");
        self.interceptors.bulk_install(interceptors);
    }

    fn interceptors(&self) -> Arc<Vec<Arc<dyn LifecycleInterceptor>>> {
        self.interceptors.snapshot()
    }
}
