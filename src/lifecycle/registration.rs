//! # Lifecycle-Interceptor Registration
//!
//! Installs discovered lifecycle interceptors in their final order:
//! boundary checker, priority-ordered, ordered, unordered, then the
//! merged-definition-aware interceptors moved to the end, and finally the
//! listener detector.

use crate::error::ContainerResult;
use crate::events::ListenerRegistry;
use crate::lifecycle::{BoundaryChecker, LifecycleInterceptor, ListenerDetector};
use crate::logging::log_interceptor_registration;
use crate::ordering::{order, Prioritized, Priority};
use crate::registry::{Capability, DefinitionRegistry};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RegistrationReport {
    /// Chain length every application component should observe
    pub target_count: usize,
    pub discovered: Vec<String>,
    /// Installed chain after registration
    pub installed: Vec<String>,
    pub checker: Arc<BoundaryChecker>,
}

type Entry = Prioritized<Arc<dyn LifecycleInterceptor>>;

/// Registers the lifecycle interceptors declared in a registry
pub struct InterceptorRegistrar {
    listeners: Arc<ListenerRegistry>,
    early_instance_advisories: bool,
}

impl InterceptorRegistrar {
    pub fn new(listeners: Arc<ListenerRegistry>) -> Self {
        Self {
            listeners,
            early_instance_advisories: true,
        }
    }

    pub fn with_early_instance_advisories(mut self, enabled: bool) -> Self {
        self.early_instance_advisories = enabled;
        self
    }

    pub fn register(&self, registry: &dyn DefinitionRegistry) -> ContainerResult<RegistrationReport> {
        let discovered = registry.names_implementing(Capability::LifecycleInterceptor);
        let target_count = registry.interceptor_count() + 1 + discovered.len();

        let checker = Arc::new(BoundaryChecker::new(
            target_count,
            self.early_instance_advisories,
        ));
        registry.install_interceptor(checker.clone());
        log_interceptor_registration(
            "install",
            Some(checker.name()),
            "installed",
            Some(format!("target_count={target_count}").as_str()),
        );

        let mut highest: Vec<Entry> = Vec::new();
        let mut internal: Vec<Entry> = Vec::new();
        let mut explicit_names = Vec::new();
        let mut unordered_names = Vec::new();

        for name in &discovered {
            match registry.priority_of(name)? {
                priority @ Priority::PriorityOrdered(_) => {
                    highest.push(materialize(registry, name, priority, &mut internal)?);
                }
                Priority::Ordered(_) => explicit_names.push(name.clone()),
                Priority::Unordered => unordered_names.push(name.clone()),
            }
        }

        install_tier(registry, "priority_ordered", order(highest));

        let mut explicit = Vec::with_capacity(explicit_names.len());
        for name in &explicit_names {
            let priority = registry.priority_of(name)?;
            explicit.push(materialize(registry, name, priority, &mut internal)?);
        }
        install_tier(registry, "ordered", order(explicit));

        let mut unordered = Vec::with_capacity(unordered_names.len());
        for name in &unordered_names {
            unordered.push(materialize(registry, name, Priority::Unordered, &mut internal)?);
        }
        install_tier(registry, "unordered", unordered);

        install_tier(registry, "internal", order(internal));

        let detector: Arc<dyn LifecycleInterceptor> =
            Arc::new(ListenerDetector::new(Arc::clone(&self.listeners)));
        registry.install_interceptor(detector);
        log_interceptor_registration("install", Some("ListenerDetector"), "installed", None);

        let installed: Vec<String> = registry
            .interceptors()
            .iter()
            .map(|interceptor| interceptor.name().to_string())
            .collect();

        info!(
            discovered = discovered.len(),
            target_count = target_count,
            installed = installed.len(),
            "🔗 INTERCEPTORS: Lifecycle interceptor registration complete"
        );

        Ok(RegistrationReport {
            target_count,
            discovered,
            installed,
            checker,
        })
    }
}

fn materialize(
    registry: &dyn DefinitionRegistry,
    name: &str,
    priority: Priority,
    internal: &mut Vec<Entry>,
) -> ContainerResult<Entry> {
    let interceptor = registry.materialize_interceptor(name)?;
    let entry = Prioritized::new(name, priority, interceptor);
    if entry.item.is_merged_definition_aware() {
        internal.push(entry.clone());
    }
    Ok(entry)
}

fn install_tier(registry: &dyn DefinitionRegistry, tier: &str, entries: Vec<Entry>) {
    if entries.is_empty() {
        return;
    }
    let names: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
    log_interceptor_registration("bulk_install", None, tier, Some(names.join(",").as_str()));
    registry.bulk_install_interceptors(entries.into_iter().map(|entry| entry.item).collect());
}

/// Register interceptors with early-instance advisories enabled
pub fn register_lifecycle_interceptors(
    registry: &dyn DefinitionRegistry,
    listeners: Arc<ListenerRegistry>,
) -> ContainerResult<RegistrationReport> {
    InterceptorRegistrar::new(listeners).register(registry)
}
