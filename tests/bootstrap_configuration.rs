//! Integration tests for bootstrap with configuration-class processing

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stratum_core::bootstrap::ContainerBootstrap;
use stratum_core::config::{ConfigManager, StratumConfig};
use stratum_core::configuration::{MetadataCatalog, ScanSpec, TypeFilter, TypeMetadata};
use stratum_core::constants::{attributes, events, names};
use stratum_core::logging::LogSettings;
use stratum_core::ordering::Priority;
use stratum_core::pipeline::PipelinePhase;
use stratum_core::registry::{
    downcast_component, factory, Capability, Component, DefaultComponentRegistry, DefinitionRegistry,
    Descriptor, ValueComponent,
};
use stratum_core::test_helpers::{Journal, RecordingListener, RecordingMutator};

type Repository = ValueComponent<Arc<dyn Component>>;

/// Configuration type declaring `dataSource` and a `repository` that asks
/// for its sibling through the factory context
fn configuration_type(type_name: &str, full: bool, created: &Arc<AtomicUsize>) -> TypeMetadata {
    let counter = Arc::clone(created);
    let data_source = Descriptor::new("app.DataSource").with_factory(move |_| {
        let serial = counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ValueComponent::new("app.DataSource", serial)) as Arc<dyn Component>)
    });
    let repository = Descriptor::new("app.Repository").with_factory(|ctx| {
        let data_source = ctx.dependency("dataSource")?;
        Ok(Arc::new(ValueComponent::new("app.Repository", data_source)) as Arc<dyn Component>)
    });

    let metadata = TypeMetadata::new(type_name)
        .with_factory_method("dataSource", "dataSource", data_source)
        .with_factory_method("repository", "repository", repository);
    if full {
        metadata.full_configuration()
    } else {
        metadata.lite_configuration()
    }
}

fn bootstrap_with(catalog: MetadataCatalog, registry: &DefaultComponentRegistry) -> stratum_core::BootstrapReport {
    ContainerBootstrap::new(StratumConfig::default())
        .with_introspector(Arc::new(catalog))
        .run(registry)
        .unwrap()
}

fn repository_data_source(registry: &DefaultComponentRegistry) -> Arc<dyn Component> {
    let repository = downcast_component::<Repository>(registry.get_component("repository").unwrap()).unwrap();
    Arc::clone(repository.value())
}

#[test]
fn test_full_configuration_shares_canonical_singleton() {
    let created = Arc::new(AtomicUsize::new(0));
    let catalog = MetadataCatalog::new().with_type(configuration_type("app.FullConfig", true, &created));
    let registry = DefaultComponentRegistry::new();
    registry.register_descriptor("fullConfig", Descriptor::new("app.FullConfig")).unwrap();

    bootstrap_with(catalog, &registry);

    let canonical = registry.get_component("dataSource").unwrap();
    let injected = repository_data_source(&registry);
    assert!(std::ptr::addr_eq(Arc::as_ptr(&canonical), Arc::as_ptr(&injected)));
    assert_eq!(created.load(Ordering::SeqCst), 1);

    let descriptor = registry.descriptor("fullConfig").unwrap();
    assert_eq!(descriptor.attribute_str(attributes::CONFIGURATION_CLASS), Some("full"));
    assert!(descriptor.attribute_flag(attributes::ENHANCED));
    assert!(descriptor.attribute_flag(attributes::PRESERVE_TARGET_TYPE));
}

#[test]
fn test_lite_configuration_invokes_sibling_directly() {
    let created = Arc::new(AtomicUsize::new(0));
    let catalog = MetadataCatalog::new().with_type(configuration_type("app.LiteConfig", false, &created));
    let registry = DefaultComponentRegistry::new();
    registry.register_descriptor("liteConfig", Descriptor::new("app.LiteConfig")).unwrap();

    bootstrap_with(catalog, &registry);

    let canonical = registry.get_component("dataSource").unwrap();
    let injected = repository_data_source(&registry);
    assert!(!std::ptr::addr_eq(Arc::as_ptr(&canonical), Arc::as_ptr(&injected)));
    assert_eq!(created.load(Ordering::SeqCst), 2);

    let descriptor = registry.descriptor("liteConfig").unwrap();
    assert_eq!(descriptor.attribute_str(attributes::CONFIGURATION_CLASS), Some("lite"));
    assert!(!descriptor.attribute_flag(attributes::ENHANCED));
}

#[test]
fn test_scanned_components_are_bootstrapped_before_user_mutators() {
    let journal = Journal::new();
    let listener = RecordingListener::new("audit", &journal);
    let listener_instance = Arc::clone(&listener);

    let catalog = MetadataCatalog::new()
        .with_type(
            TypeMetadata::new("app.AppConfig")
                .full_configuration()
                .with_component_scan(
                    ScanSpec::new()
                        .with_base_package("app.events, app.services")
                        .exclude(TypeFilter::regex(r"app\.services\.Legacy.*").unwrap()),
                ),
        )
        .with_type(
            TypeMetadata::new("app.events.AuditListener")
                .with_stereotype("component")
                .with_capability(Capability::EventListener)
                .with_factory(factory(move |_| Ok(Arc::clone(&listener_instance) as Arc<dyn Component>))),
        )
        .with_type(
            TypeMetadata::new("app.services.OrderService")
                .with_stereotype("service")
                .with_factory(factory(|_| {
                    Ok(Arc::new(ValueComponent::new("app.services.OrderService", ())) as Arc<dyn Component>)
                })),
        )
        .with_type(TypeMetadata::new("app.services.LegacyService").with_stereotype("service"))
        .with_type(TypeMetadata::new("app.services.Helper"));

    let registry = DefaultComponentRegistry::new();
    registry.register_descriptor("appConfig", Descriptor::new("app.AppConfig")).unwrap();
    let user_mutator = RecordingMutator::new("user-mutator", &journal);
    registry
        .register_descriptor("user-mutator", user_mutator.descriptor(Priority::Ordered(0)))
        .unwrap();

    let mut bootstrap = ContainerBootstrap::new(StratumConfig::default()).with_introspector(Arc::new(catalog));
    let report = bootstrap.run(&registry).unwrap();

    assert_eq!(
        report.pipeline.invoked(PipelinePhase::MutateRegistry),
        vec![names::CONFIGURATION_PROCESSOR, "user-mutator"]
    );
    assert!(registry.contains_descriptor("auditListener"));
    assert!(registry.contains_descriptor("orderService"));
    assert!(!registry.contains_descriptor("legacyService"));
    assert!(!registry.contains_descriptor("helper"));

    assert!(registry.contains_instance("orderService"));
    assert_eq!(bootstrap.listeners().listener_names(), vec!["auditListener"]);
    assert_eq!(report.refreshed_listeners, 1);
    assert_eq!(journal.with_prefix("event:audit:"), vec![events::CONTEXT_REFRESHED]);
}

#[test]
fn test_bootstrap_from_loaded_configuration() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("stratum.toml"),
        r#"
[container]
eager_singletons = false
register_configuration_processor = false

[logging]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let manager = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test").unwrap();
    assert!(!manager.config().container.eager_singletons);
    assert_eq!(manager.config().logging.format, "json");
    let settings = LogSettings::resolve(Some(&manager.config().logging));
    assert_eq!(settings.level, "debug");
    if std::env::var("STRATUM_LOG_FORMAT").is_err() {
        assert!(settings.json);
    }

    let created = Arc::new(AtomicUsize::new(0));
    let registry = DefaultComponentRegistry::new();
    registry.register_descriptor("fullConfig", Descriptor::new("app.FullConfig")).unwrap();

    let report = ContainerBootstrap::new(manager.config().clone())
        .with_introspector(Arc::new(
            MetadataCatalog::new().with_type(configuration_type("app.FullConfig", true, &created)),
        ))
        .run(&registry)
        .unwrap();

    assert_eq!(report.preinstantiated, 0);
    assert!(!registry.contains_descriptor(names::CONFIGURATION_PROCESSOR));
    assert!(!registry.contains_descriptor("dataSource"));
    assert_eq!(created.load(Ordering::SeqCst), 0);
}
