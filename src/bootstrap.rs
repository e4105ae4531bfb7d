//! # Container Bootstrap
//!
//! Drives a definition registry from raw descriptors to a refreshed
//! container:
//!
//! 1. register the built-in configuration processor (when enabled and an
//!    introspector is available);
//! 2. run the registry pipeline over discovered and supplied processors;
//! 3. register lifecycle interceptors;
//! 4. pre-instantiate non-lazy singletons (when `eager_singletons` is set);
//! 5. publish `context.refreshed`.
//!
//! Any failure aborts bootstrap and is returned as a [`StratumError`].

use crate::config::StratumConfig;
use crate::configuration::{ConfigurationProcessor, MetadataIntrospector};
use crate::constants::events;
use crate::error::{Result, StratumError};
use crate::events::{EventPublisher, ListenerRegistry};
use crate::lifecycle::{InterceptorRegistrar, RegistrationReport};
use crate::logging::init_structured_logging_with;
use crate::pipeline::{run_registry_pipeline, PipelineReport, SuppliedProcessor};
use crate::registry::DefinitionRegistry;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Wall-clock time spent in each bootstrap phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapTimings {
    pub pipeline: Duration,
    pub interceptors: Duration,
    pub preinstantiation: Duration,
    pub total: Duration,
}

/// Outcome of a successful bootstrap
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub pipeline: PipelineReport,
    pub interceptors: RegistrationReport,
    /// Singletons created by eager pre-instantiation
    pub preinstantiated: usize,
    /// Listeners that received `context.refreshed`
    pub refreshed_listeners: usize,
    pub timings: BootstrapTimings,
}

/// Startup sequence for one definition registry
pub struct ContainerBootstrap {
    config: StratumConfig,
    introspector: Option<Arc<dyn MetadataIntrospector>>,
    supplied: Vec<SuppliedProcessor>,
    publisher: EventPublisher,
}

impl ContainerBootstrap {
    pub fn new(config: StratumConfig) -> Self {
        Self {
            config,
            introspector: None,
            supplied: Vec::new(),
            publisher: EventPublisher::new(Arc::new(ListenerRegistry::new()), EVENT_CHANNEL_CAPACITY),
        }
    }

    /// Metadata source for the built-in configuration processor
    pub fn with_introspector(mut self, introspector: Arc<dyn MetadataIntrospector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Processor handed to the pipeline directly rather than discovered
    pub fn with_supplied_processor(mut self, processor: SuppliedProcessor) -> Self {
        self.supplied.push(processor);
        self
    }

    pub fn config(&self) -> &StratumConfig {
        &self.config
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        self.publisher.listeners()
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Run the startup sequence against `registry`. Supplied processors are
    /// consumed by the first run.
    pub fn run(&mut self, registry: &dyn DefinitionRegistry) -> Result<BootstrapReport> {
        init_structured_logging_with(&self.config.logging);
        let started = Instant::now();
        let registry_id = registry.registry_id();
        info!(
            registry = %registry_id,
            descriptors = registry.descriptor_count(),
            "🚀 BOOTSTRAP: Starting container bootstrap"
        );

        let result = self.run_phases(registry, started);
        match &result {
            Ok(report) => info!(
                registry = %registry_id,
                descriptors = registry.descriptor_count(),
                interceptors = report.interceptors.installed.len(),
                preinstantiated = report.preinstantiated,
                total_ms = report.timings.total.as_millis() as u64,
                "✅ BOOTSTRAP: Container refreshed"
            ),
            Err(e) => error!(registry = %registry_id, error = %e, "❌ BOOTSTRAP: Container bootstrap failed"),
        }
        result
    }

    fn run_phases(&mut self, registry: &dyn DefinitionRegistry, started: Instant) -> Result<BootstrapReport> {
        self.register_configuration_processor(registry)?;

        let phase = Instant::now();
        let pipeline = run_registry_pipeline(registry, std::mem::take(&mut self.supplied))?;
        let pipeline_elapsed = phase.elapsed();

        let phase = Instant::now();
        let interceptors = InterceptorRegistrar::new(Arc::clone(self.publisher.listeners()))
            .with_early_instance_advisories(self.config.container.early_instance_advisories)
            .register(registry)?;
        let interceptors_elapsed = phase.elapsed();

        let phase = Instant::now();
        let preinstantiated = if self.config.container.eager_singletons {
            registry.preinstantiate_singletons()?
        } else {
            debug!("Eager singleton pre-instantiation disabled");
            0
        };
        let preinstantiation_elapsed = phase.elapsed();

        let refreshed_listeners = self.publisher.publish(
            events::CONTEXT_REFRESHED,
            json!({
                "registry_id": registry.registry_id().to_string(),
                "descriptors": registry.descriptor_count(),
                "interceptors": interceptors.installed.len(),
                "preinstantiated": preinstantiated,
            }),
        );

        Ok(BootstrapReport {
            pipeline,
            interceptors,
            preinstantiated,
            refreshed_listeners,
            timings: BootstrapTimings {
                pipeline: pipeline_elapsed,
                interceptors: interceptors_elapsed,
                preinstantiation: preinstantiation_elapsed,
                total: started.elapsed(),
            },
        })
    }

    fn register_configuration_processor(&self, registry: &dyn DefinitionRegistry) -> Result<()> {
        if !self.config.container.register_configuration_processor {
            debug!("Configuration processor registration disabled");
            return Ok(());
        }
        let Some(introspector) = &self.introspector else {
            debug!("No metadata introspector configured, skipping configuration processor");
            return Ok(());
        };
        let name = self.config.container.configuration_processor_name.as_str();
        if registry.contains_descriptor(name) {
            debug!(name = name, "Configuration processor already registered");
            return Ok(());
        }

        let processor = Arc::new(ConfigurationProcessor::new(Arc::clone(introspector)).with_name(name));
        ConfigurationProcessor::register(processor, registry).map_err(StratumError::from)
    }
}

impl std::fmt::Debug for ContainerBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerBootstrap")
            .field("config", &self.config)
            .field("has_introspector", &self.introspector.is_some())
            .field("supplied", &self.supplied.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::names;
    use crate::configuration::{MetadataCatalog, TypeMetadata};
    use crate::error::ContainerError;
    use crate::ordering::Priority;
    use crate::pipeline::PipelinePhase;
    use crate::registry::{Component, DefaultComponentRegistry, Descriptor, ValueComponent};
    use crate::test_helpers::{Journal, RecordingInterceptor, RecordingListener, RecordingMutator};

    fn value_descriptor(type_name: &'static str) -> Descriptor {
        Descriptor::new(type_name)
            .with_factory(move |_| Ok(Arc::new(ValueComponent::new(type_name, ())) as Arc<dyn Component>))
    }

    #[test]
    fn test_bootstrap_runs_every_phase() {
        let journal = Journal::new();
        let registry = DefaultComponentRegistry::new();
        let mutator = RecordingMutator::new("m1", &journal);
        let interceptor = RecordingInterceptor::new("audit", &journal);
        let listener = RecordingListener::new("refresh", &journal);
        registry.register_descriptor("m1", mutator.descriptor(Priority::Unordered)).unwrap();
        registry.register_descriptor("audit", interceptor.descriptor(Priority::Unordered)).unwrap();
        registry.register_descriptor("refresh", listener.descriptor()).unwrap();
        registry.register_descriptor("service", value_descriptor("app.Service")).unwrap();

        let mut bootstrap = ContainerBootstrap::new(StratumConfig::default());
        let report = bootstrap.run(&registry).unwrap();

        assert_eq!(report.pipeline.invoked(PipelinePhase::MutateRegistry), vec!["m1"]);
        assert!(report.interceptors.installed.contains(&"audit".to_string()));
        assert_eq!(report.preinstantiated, 2);
        assert_eq!(report.refreshed_listeners, 1);
        assert!(journal.position("after:audit:service").is_some());
        assert_eq!(journal.count("event:refresh:context.refreshed"), 1);
    }

    #[test]
    fn test_lazy_bootstrap_skips_preinstantiation() {
        let registry = DefaultComponentRegistry::new();
        registry.register_descriptor("service", value_descriptor("app.Service")).unwrap();

        let mut config = StratumConfig::default();
        config.container.eager_singletons = false;
        let report = ContainerBootstrap::new(config).run(&registry).unwrap();

        assert_eq!(report.preinstantiated, 0);
        assert!(!registry.contains_instance("service"));
        assert_eq!(report.refreshed_listeners, 0);
    }

    #[test]
    fn test_configuration_processor_requires_introspector() {
        let registry = DefaultComponentRegistry::new();
        ContainerBootstrap::new(StratumConfig::default()).run(&registry).unwrap();
        assert!(!registry.contains_descriptor(names::CONFIGURATION_PROCESSOR));

        let catalog = MetadataCatalog::new().with_type(TypeMetadata::new("app.AppConfig").full_configuration());
        let registry = DefaultComponentRegistry::new();
        registry.register_descriptor("appConfig", Descriptor::new("app.AppConfig")).unwrap();
        let report = ContainerBootstrap::new(StratumConfig::default())
            .with_introspector(Arc::new(catalog))
            .run(&registry)
            .unwrap();

        assert!(registry.contains_descriptor(names::CONFIGURATION_PROCESSOR));
        assert_eq!(
            report.pipeline.invoked(PipelinePhase::MutateRegistry),
            vec![names::CONFIGURATION_PROCESSOR]
        );
    }

    #[test]
    fn test_configuration_processor_registered_under_configured_name() {
        let mut config = StratumConfig::default();
        config.container.configuration_processor_name = "app.configProcessor".to_string();
        let catalog = MetadataCatalog::new().with_type(TypeMetadata::new("app.AppConfig").full_configuration());
        let registry = DefaultComponentRegistry::new();
        registry.register_descriptor("appConfig", Descriptor::new("app.AppConfig")).unwrap();

        let report = ContainerBootstrap::new(config)
            .with_introspector(Arc::new(catalog))
            .run(&registry)
            .unwrap();

        assert!(registry.contains_descriptor("app.configProcessor"));
        assert!(!registry.contains_descriptor(names::CONFIGURATION_PROCESSOR));
        assert_eq!(
            report.pipeline.invoked(PipelinePhase::MutateRegistry),
            vec!["app.configProcessor"]
        );
    }

    #[test]
    fn test_disabled_configuration_processor() {
        let mut config = StratumConfig::default();
        config.container.register_configuration_processor = false;
        let registry = DefaultComponentRegistry::new();

        ContainerBootstrap::new(config)
            .with_introspector(Arc::new(MetadataCatalog::new()))
            .run(&registry)
            .unwrap();

        assert!(!registry.contains_descriptor(names::CONFIGURATION_PROCESSOR));
    }

    #[test]
    fn test_second_run_is_rejected() {
        let registry = DefaultComponentRegistry::new();
        let mut bootstrap = ContainerBootstrap::new(StratumConfig::default());
        bootstrap.run(&registry).unwrap();

        let error = bootstrap.run(&registry).unwrap_err();
        assert!(matches!(
            error,
            StratumError::Container(ContainerError::IllegalReentry { .. })
        ));
    }
}
