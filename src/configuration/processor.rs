//! # Configuration Processor
//!
//! Built-in registry mutator that expands configuration descriptors into the
//! descriptors they declare, then marks full configurations as enhanced
//! during the finalizer phase.

use crate::configuration::metadata::{check_configuration_candidate, configuration_order, MetadataIntrospector};
use crate::constants::{attributes, names, LOWEST_PRECEDENCE};
use crate::error::{ContainerError, ContainerResult};
use crate::logging::log_pipeline_phase;
use crate::ordering::Priority;
use crate::pipeline::{FactoryFinalizer, RegistryMutator};
use crate::registry::{Capability, Component, DefinitionRegistry, Descriptor, RegistryId, Role};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ConfigurationProcessor {
    name: String,
    introspector: Arc<dyn MetadataIntrospector>,
    registries_processed: Mutex<HashSet<RegistryId>>,
    factories_processed: Mutex<HashSet<RegistryId>>,
}

impl ConfigurationProcessor {
    pub fn new(introspector: Arc<dyn MetadataIntrospector>) -> Self {
        Self {
            name: names::CONFIGURATION_PROCESSOR.to_string(),
            introspector,
            registries_processed: Mutex::new(HashSet::new()),
            factories_processed: Mutex::new(HashSet::new()),
        }
    }

    /// Registration name, `internal.configurationProcessor` unless overridden
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register `processor` as the built-in infrastructure mutator
    pub fn register(
        processor: Arc<ConfigurationProcessor>,
        registry: &dyn DefinitionRegistry,
    ) -> ContainerResult<()> {
        let descriptor = Descriptor::new(std::any::type_name::<ConfigurationProcessor>())
            .with_capability(Capability::RegistryMutator)
            .with_priority(Priority::PriorityOrdered(LOWEST_PRECEDENCE))
            .with_role(Role::Infrastructure)
            .with_factory({
                let processor = Arc::clone(&processor);
                move |_| Ok(Arc::clone(&processor) as Arc<dyn Component>)
            });
        registry.register_descriptor(processor.name(), descriptor)
    }

    fn check_candidate(&self, registry: &dyn DefinitionRegistry, name: &str) -> ContainerResult<bool> {
        let introspector = self.introspector.as_ref();
        let mut candidate = false;
        registry.update_descriptor(name, &mut |descriptor: &mut Descriptor| {
            candidate = check_configuration_candidate(descriptor, introspector);
        })?;
        Ok(candidate)
    }

    /// Expand every unprocessed configuration descriptor, repeating until a
    /// pass discovers no new configuration. Returns the number of
    /// descriptors registered.
    pub fn process_configuration_definitions(&self, registry: &dyn DefinitionRegistry) -> ContainerResult<usize> {
        let mut candidate_names = registry.descriptor_names();
        let mut candidates: Vec<(String, i32)> = Vec::new();

        for name in &candidate_names {
            let descriptor = registry.descriptor(name)?;
            if descriptor.attribute(attributes::CONFIGURATION_CLASS).is_some() {
                debug!(name = %name, "Descriptor already processed as a configuration");
                continue;
            }
            if self.check_candidate(registry, name)? {
                let descriptor = registry.descriptor(name)?;
                candidates.push((name.clone(), configuration_order(&descriptor)));
            }
        }

        if candidates.is_empty() {
            return Ok(0);
        }
        candidates.sort_by_key(|(_, order)| *order);

        let mut parsed_types: HashSet<String> = HashSet::new();
        let mut registered = 0usize;

        loop {
            for (name, _) in candidates.drain(..) {
                let descriptor = registry.descriptor(&name)?;
                if !parsed_types.insert(descriptor.type_name().to_string()) {
                    continue;
                }
                registered += self.load_declared_definitions(registry, &name, &descriptor)?;
            }

            if registry.descriptor_count() > candidate_names.len() {
                let known: HashSet<String> = candidate_names.into_iter().collect();
                let current = registry.descriptor_names();
                for name in current.iter().filter(|name| !known.contains(*name)) {
                    if self.check_candidate(registry, name)? {
                        let descriptor = registry.descriptor(name)?;
                        if !parsed_types.contains(descriptor.type_name()) {
                            candidates.push((name.clone(), configuration_order(&descriptor)));
                        }
                    }
                }
                candidate_names = current;
            }

            if candidates.is_empty() {
                break;
            }
        }

        log_pipeline_phase("configuration", "expanded", registered, None);
        Ok(registered)
    }

    fn load_declared_definitions(
        &self,
        registry: &dyn DefinitionRegistry,
        name: &str,
        descriptor: &Descriptor,
    ) -> ContainerResult<usize> {
        let mut registered = 0;
        for (declared_name, declared) in self.introspector.declared_definitions(name, descriptor)? {
            if registry.contains_descriptor(&declared_name) {
                debug!(
                    configuration = %name,
                    name = %declared_name,
                    "Skipping declared descriptor overridden by an existing registration"
                );
                continue;
            }
            registry.register_descriptor(&declared_name, declared)?;
            registered += 1;
        }
        debug!(configuration = %name, registered = registered, "Loaded configuration");
        Ok(registered)
    }

    /// Mark every full configuration as enhanced. Returns how many were marked.
    pub fn enhance_configurations(&self, registry: &dyn DefinitionRegistry) -> ContainerResult<usize> {
        let mut enhanced = 0;
        for name in registry.descriptor_names() {
            let descriptor = registry.descriptor(&name)?;
            if descriptor.attribute_str(attributes::CONFIGURATION_CLASS) != Some(attributes::CONFIGURATION_FULL) {
                continue;
            }
            if registry.contains_instance(&name) {
                info!(
                    name = %name,
                    "Cannot enhance configuration: its singleton was created too early. \
                     Sibling factory-method calls made before this point were not canonical"
                );
            }
            registry.update_descriptor(&name, &mut |descriptor: &mut Descriptor| {
                descriptor.set_attribute(attributes::PRESERVE_TARGET_TYPE, true);
                descriptor.set_attribute(attributes::ENHANCED, true);
            })?;
            enhanced += 1;
        }
        Ok(enhanced)
    }
}

impl FactoryFinalizer for ConfigurationProcessor {
    fn processor_name(&self) -> &str {
        &self.name
    }

    fn finalize_factory(&self, registry: &dyn DefinitionRegistry) -> ContainerResult<()> {
        let id = registry.registry_id();
        if !self.factories_processed.lock().insert(id) {
            return Err(ContainerError::IllegalReentry {
                phase: "finalize_factory".to_string(),
                identity: id.to_string(),
            });
        }
        if !self.registries_processed.lock().contains(&id) {
            // Mutation hook never ran for this registry
            self.process_configuration_definitions(registry)?;
        }
        let enhanced = self.enhance_configurations(registry)?;
        log_pipeline_phase("configuration", "enhanced", enhanced, None);
        Ok(())
    }
}

impl RegistryMutator for ConfigurationProcessor {
    fn mutate_registry(&self, registry: &dyn DefinitionRegistry) -> ContainerResult<()> {
        let id = registry.registry_id();
        if self.factories_processed.lock().contains(&id) {
            return Err(ContainerError::IllegalReentry {
                phase: "mutate_registry".to_string(),
                identity: id.to_string(),
            });
        }
        if !self.registries_processed.lock().insert(id) {
            return Err(ContainerError::IllegalReentry {
                phase: "mutate_registry".to_string(),
                identity: id.to_string(),
            });
        }
        self.process_configuration_definitions(registry)?;
        Ok(())
    }
}

impl Component for ConfigurationProcessor {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn as_registry_mutator(self: Arc<Self>) -> Option<Arc<dyn RegistryMutator>> {
        Some(self)
    }

    fn as_factory_finalizer(self: Arc<Self>) -> Option<Arc<dyn FactoryFinalizer>> {
        Some(self)
    }
}

impl std::fmt::Debug for ConfigurationProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationProcessor")
            .field("registries_processed", &self.registries_processed.lock().len())
            .field("factories_processed", &self.factories_processed.lock().len())
            .finish()
    }
}
