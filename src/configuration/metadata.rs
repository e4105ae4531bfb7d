//! # Type Metadata
//!
//! The metadata introspection contract consumed by configuration
//! processing, and [`MetadataCatalog`], an in-memory type index that
//! implements it.

use crate::constants::{attributes, LOWEST_PRECEDENCE};
use crate::error::{ContainerError, ContainerResult};
use crate::ordering::Priority;
use crate::registry::{Capability, ComponentFactory, Descriptor, Role};
use crate::configuration::scanner::{ComponentScanner, IdentityResolver, PlaceholderResolver, ScanSpec};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Stereotypes that make a type a scannable component
pub const COMPONENT_STEREOTYPES: &[&str] = &["component", "service", "repository", "controller"];

/// Stereotypes that make a type a lite configuration candidate
pub const CANDIDATE_INDICATORS: &[&str] = &["component", "component_scan", "import", "import_resource"];

/// Declared configuration marker of a type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigurationMarker {
    #[default]
    None,
    /// Factory-method calls between siblings yield the canonical singleton
    Full,
    /// Declared configuration whose factory methods are plain calls
    Lite,
}

/// A factory method declared by a configuration type
#[derive(Debug, Clone)]
pub struct FactoryMethod {
    /// Name the produced component is registered under
    pub component_name: String,
    pub method: String,
    pub descriptor: Descriptor,
}

/// Declared metadata of one type
#[derive(Clone, Default)]
pub struct TypeMetadata {
    pub type_name: String,
    pub stereotypes: BTreeSet<String>,
    pub configuration: ConfigurationMarker,
    pub is_interface: bool,
    pub order: Option<i32>,
    pub supertypes: Vec<String>,
    pub capabilities: BTreeSet<Capability>,
    pub priority: Priority,
    pub role: Role,
    pub factory_methods: Vec<FactoryMethod>,
    pub component_scan: Option<ScanSpec>,
    pub imports: Vec<String>,
    pub factory: Option<ComponentFactory>,
}

impl TypeMetadata {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn with_stereotype(mut self, stereotype: impl Into<String>) -> Self {
        self.stereotypes.insert(stereotype.into());
        self
    }

    pub fn full_configuration(mut self) -> Self {
        self.configuration = ConfigurationMarker::Full;
        self
    }

    pub fn lite_configuration(mut self) -> Self {
        self.configuration = ConfigurationMarker::Lite;
        self
    }

    pub fn interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
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

    pub fn with_factory_method(
        mut self,
        component_name: impl Into<String>,
        method: impl Into<String>,
        descriptor: Descriptor,
    ) -> Self {
        self.factory_methods.push(FactoryMethod {
            component_name: component_name.into(),
            method: method.into(),
            descriptor,
        });
        self
    }

    pub fn with_component_scan(mut self, spec: ScanSpec) -> Self {
        self.stereotypes.insert("component_scan".to_string());
        self.component_scan = Some(spec);
        self
    }

    pub fn with_import(mut self, type_name: impl Into<String>) -> Self {
        self.stereotypes.insert("import".to_string());
        self.imports.push(type_name.into());
        self
    }

    pub fn with_factory(mut self, factory: ComponentFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Component stereotype, directly or through a configuration marker
    pub fn is_component(&self) -> bool {
        self.configuration != ConfigurationMarker::None
            || COMPONENT_STEREOTYPES
                .iter()
                .any(|stereotype| self.stereotypes.contains(*stereotype))
    }

    pub fn package(&self) -> &str {
        package_of(&self.type_name)
    }

    /// Descriptor for registering this type as a component
    pub fn to_descriptor(&self) -> Descriptor {
        let mut descriptor = Descriptor::new(&self.type_name)
            .with_priority(self.priority)
            .with_role(self.role);
        for capability in &self.capabilities {
            descriptor = descriptor.with_capability(*capability);
        }
        if let Some(factory) = &self.factory {
            descriptor = descriptor.with_component_factory(Arc::clone(factory));
        }
        descriptor
    }
}

impl std::fmt::Debug for TypeMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("type_name", &self.type_name)
            .field("stereotypes", &self.stereotypes)
            .field("configuration", &self.configuration)
            .field("order", &self.order)
            .field("factory_methods", &self.factory_methods.len())
            .field("imports", &self.imports)
            .finish()
    }
}

/// Package part of a dotted type name
pub fn package_of(type_name: &str) -> &str {
    type_name
        .rsplit_once('.')
        .map(|(package, _)| package)
        .unwrap_or("")
}

/// Metadata questions configuration processing asks about descriptors
pub trait MetadataIntrospector: Send + Sync {
    /// Declared configuration, a candidate indicator, or factory methods
    fn is_configuration_candidate(&self, descriptor: &Descriptor) -> bool;

    /// Declared configuration whose sibling factory-method calls must yield canonical singletons
    fn is_full_configuration(&self, descriptor: &Descriptor) -> bool;

    fn get_order(&self, descriptor: &Descriptor) -> Option<i32>;

    fn has_factory_methods(&self, descriptor: &Descriptor) -> bool;

    /// Descriptors the configuration registered as `name` contributes
    fn declared_definitions(
        &self,
        name: &str,
        descriptor: &Descriptor,
    ) -> ContainerResult<Vec<(String, Descriptor)>>;
}

/// Record configuration facts on a descriptor. Returns whether it is a
/// configuration candidate.
pub fn check_configuration_candidate(
    descriptor: &mut Descriptor,
    introspector: &dyn MetadataIntrospector,
) -> bool {
    if descriptor.type_name().is_empty() || descriptor.factory_method().is_some() {
        return false;
    }
    if descriptor.is_infrastructure_capable() {
        return false;
    }

    if introspector.is_full_configuration(descriptor) {
        descriptor.set_attribute(attributes::CONFIGURATION_CLASS, attributes::CONFIGURATION_FULL);
    } else if introspector.is_configuration_candidate(descriptor) {
        descriptor.set_attribute(attributes::CONFIGURATION_CLASS, attributes::CONFIGURATION_LITE);
    } else {
        return false;
    }

    if let Some(order) = introspector.get_order(descriptor) {
        descriptor.set_attribute(attributes::ORDER, order);
    }
    true
}

/// Order recorded by [`check_configuration_candidate`], or lowest precedence
pub fn configuration_order(descriptor: &Descriptor) -> i32 {
    descriptor
        .attribute(attributes::ORDER)
        .and_then(serde_json::Value::as_i64)
        .and_then(|order| i32::try_from(order).ok())
        .unwrap_or(LOWEST_PRECEDENCE)
}

/// In-memory index of type metadata keyed by type name
pub struct MetadataCatalog {
    types: HashMap<String, TypeMetadata>,
    resolver: Arc<dyn PlaceholderResolver>,
}

impl MetadataCatalog {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
            resolver: Arc::new(IdentityResolver),
        }
    }

    pub fn with_placeholder_resolver(mut self, resolver: Arc<dyn PlaceholderResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_type(mut self, metadata: TypeMetadata) -> Self {
        self.register(metadata);
        self
    }

    pub fn register(&mut self, metadata: TypeMetadata) {
        self.types.insert(metadata.type_name.clone(), metadata);
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeMetadata> {
        self.types.get(type_name)
    }

    /// Types in `package` or any sub-package, sorted by type name
    pub fn types_in_package(&self, package: &str) -> Vec<&TypeMetadata> {
        let prefix = format!("{package}.");
        let mut found: Vec<&TypeMetadata> = self
            .types
            .values()
            .filter(|metadata| package.is_empty() || metadata.type_name.starts_with(&prefix))
            .collect();
        found.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        found
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn metadata_for(&self, descriptor: &Descriptor) -> Option<&TypeMetadata> {
        self.types.get(descriptor.type_name())
    }
}

impl Default for MetadataCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataIntrospector for MetadataCatalog {
    fn is_configuration_candidate(&self, descriptor: &Descriptor) -> bool {
        let Some(metadata) = self.metadata_for(descriptor) else {
            return false;
        };
        if metadata.is_interface {
            return false;
        }
        metadata.configuration != ConfigurationMarker::None
            || CANDIDATE_INDICATORS
                .iter()
                .any(|indicator| metadata.stereotypes.contains(*indicator))
            || !metadata.factory_methods.is_empty()
    }

    fn is_full_configuration(&self, descriptor: &Descriptor) -> bool {
        self.metadata_for(descriptor)
            .map(|metadata| metadata.configuration == ConfigurationMarker::Full)
            .unwrap_or(false)
    }

    fn get_order(&self, descriptor: &Descriptor) -> Option<i32> {
        self.metadata_for(descriptor).and_then(|metadata| metadata.order)
    }

    fn has_factory_methods(&self, descriptor: &Descriptor) -> bool {
        self.metadata_for(descriptor)
            .map(|metadata| !metadata.factory_methods.is_empty())
            .unwrap_or(false)
    }

    fn declared_definitions(
        &self,
        name: &str,
        descriptor: &Descriptor,
    ) -> ContainerResult<Vec<(String, Descriptor)>> {
        let metadata = self.metadata_for(descriptor).ok_or_else(|| {
            ContainerError::Configuration(format!(
                "no metadata for configuration '{name}' of type '{}'",
                descriptor.type_name()
            ))
        })?;

        let mut definitions = Vec::new();

        if let Some(spec) = &metadata.component_scan {
            let scanner = ComponentScanner::new(self, self.resolver.as_ref());
            definitions.extend(scanner.scan(spec, &metadata.type_name)?);
        }

        for imported in &metadata.imports {
            let imported_metadata = self.get(imported).ok_or_else(|| {
                ContainerError::Configuration(format!(
                    "configuration '{name}' imports unknown type '{imported}'"
                ))
            })?;
            definitions.push((imported.clone(), imported_metadata.to_descriptor()));
        }

        for method in &metadata.factory_methods {
            let descriptor = method
                .descriptor
                .clone()
                .with_factory_method(name, &method.method);
            definitions.push((method.component_name.clone(), descriptor));
        }

        Ok(definitions)
    }
}

impl std::fmt::Debug for MetadataCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCatalog")
            .field("types", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MetadataCatalog {
        MetadataCatalog::new()
            .with_type(TypeMetadata::new("app.FullConfig").full_configuration().with_order(5))
            .with_type(TypeMetadata::new("app.LiteConfig").lite_configuration())
            .with_type(TypeMetadata::new("app.Scanned").with_stereotype("component"))
            .with_type(
                TypeMetadata::new("app.Factories")
                    .with_factory_method("clock", "clock", Descriptor::new("app.Clock")),
            )
            .with_type(TypeMetadata::new("app.Api").with_stereotype("component").interface())
            .with_type(TypeMetadata::new("app.Plain"))
    }

    fn check(catalog: &MetadataCatalog, type_name: &str) -> (bool, Descriptor) {
        let mut descriptor = Descriptor::new(type_name);
        let candidate = check_configuration_candidate(&mut descriptor, catalog);
        (candidate, descriptor)
    }

    #[test]
    fn test_full_and_lite_marking() {
        let catalog = catalog();

        let (candidate, full) = check(&catalog, "app.FullConfig");
        assert!(candidate);
        assert_eq!(full.attribute_str(attributes::CONFIGURATION_CLASS), Some("full"));
        assert_eq!(configuration_order(&full), 5);

        for lite_type in ["app.LiteConfig", "app.Scanned", "app.Factories"] {
            let (candidate, lite) = check(&catalog, lite_type);
            assert!(candidate, "{lite_type} should be a candidate");
            assert_eq!(lite.attribute_str(attributes::CONFIGURATION_CLASS), Some("lite"));
            assert_eq!(configuration_order(&lite), LOWEST_PRECEDENCE);
        }
    }

    #[test]
    fn test_non_candidates() {
        let catalog = catalog();
        assert!(!check(&catalog, "app.Plain").0);
        assert!(!check(&catalog, "app.Api").0);
        assert!(!check(&catalog, "app.Unknown").0);
        assert!(!check(&catalog, "").0);

        let mut produced = Descriptor::new("app.FullConfig").with_factory_method("other", "make");
        assert!(!check_configuration_candidate(&mut produced, &catalog));

        let mut processor =
            Descriptor::new("app.FullConfig").with_capability(Capability::LifecycleInterceptor);
        assert!(!check_configuration_candidate(&mut processor, &catalog));
    }

    #[test]
    fn test_factory_methods_declare_owner() {
        let catalog = catalog();
        let definitions = catalog
            .declared_definitions("factories", &Descriptor::new("app.Factories"))
            .unwrap();

        assert_eq!(definitions.len(), 1);
        let (name, descriptor) = &definitions[0];
        assert_eq!(name, "clock");
        assert_eq!(descriptor.factory_owner(), Some("factories"));
        assert_eq!(descriptor.factory_method(), Some("clock"));
        assert!(catalog.has_factory_methods(&Descriptor::new("app.Factories")));
    }

    #[test]
    fn test_types_in_package_includes_subpackages() {
        let catalog = MetadataCatalog::new()
            .with_type(TypeMetadata::new("app.orders.OrderService"))
            .with_type(TypeMetadata::new("app.orders.repo.OrderRepository"))
            .with_type(TypeMetadata::new("app.ordersextra.Other"));

        let names: Vec<&str> = catalog
            .types_in_package("app.orders")
            .into_iter()
            .map(|metadata| metadata.type_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["app.orders.OrderService", "app.orders.repo.OrderRepository"]
        );
        assert_eq!(package_of("app.orders.OrderService"), "app.orders");
        assert_eq!(package_of("Bare"), "");
    }
}
