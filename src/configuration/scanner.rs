//! # Component Scanning
//!
//! Turns a [`ScanSpec`] declared on a configuration type into descriptors
//! for the matching catalog types.

use crate::configuration::metadata::{package_of, MetadataCatalog, TypeMetadata};
use crate::constants::PACKAGE_DELIMITERS;
use crate::error::{ContainerError, ContainerResult};
use crate::registry::Descriptor;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// User supplied type predicate for [`TypeFilter::Custom`]
pub trait TypeMatcher: Send + Sync {
    fn matches(&self, metadata: &TypeMetadata) -> bool;
}

impl<F> TypeMatcher for F
where
    F: Fn(&TypeMetadata) -> bool + Send + Sync,
{
    fn matches(&self, metadata: &TypeMetadata) -> bool {
        self(metadata)
    }
}

#[derive(Clone)]
pub enum TypeFilter {
    /// Carries the stereotype; `component` also matches derived component stereotypes
    Stereotype(String),
    /// The type itself or any declared supertype
    AssignableType(String),
    /// Whole type name must match
    Regex(Regex),
    Custom(Arc<dyn TypeMatcher>),
}

impl TypeFilter {
    pub fn stereotype(stereotype: impl Into<String>) -> Self {
        Self::Stereotype(stereotype.into())
    }

    pub fn assignable(type_name: impl Into<String>) -> Self {
        Self::AssignableType(type_name.into())
    }

    pub fn regex(pattern: &str) -> ContainerResult<Self> {
        Regex::new(&format!("^(?:{pattern})$"))
            .map(Self::Regex)
            .map_err(|e| ContainerError::Configuration(format!("invalid type filter pattern '{pattern}': {e}")))
    }

    pub fn custom<M: TypeMatcher + 'static>(matcher: M) -> Self {
        Self::Custom(Arc::new(matcher))
    }

    pub fn matches(&self, metadata: &TypeMetadata) -> bool {
        match self {
            Self::Stereotype(stereotype) if stereotype == "component" => metadata.is_component(),
            Self::Stereotype(stereotype) => metadata.stereotypes.contains(stereotype),
            Self::AssignableType(type_name) => {
                metadata.type_name == *type_name || metadata.supertypes.contains(type_name)
            }
            Self::Regex(regex) => regex.is_match(&metadata.type_name),
            Self::Custom(matcher) => matcher.matches(metadata),
        }
    }
}

impl std::fmt::Debug for TypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stereotype(stereotype) => write!(f, "Stereotype({stereotype})"),
            Self::AssignableType(type_name) => write!(f, "AssignableType({type_name})"),
            Self::Regex(regex) => write!(f, "Regex({})", regex.as_str()),
            Self::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Scan request declared on a configuration type
#[derive(Debug, Clone)]
pub struct ScanSpec {
    /// Package expressions; may hold several packages separated by `,` `;` or whitespace
    pub base_packages: Vec<String>,
    /// Types whose packages are scanned
    pub base_package_types: Vec<String>,
    pub include_filters: Vec<TypeFilter>,
    pub exclude_filters: Vec<TypeFilter>,
    pub use_default_filters: bool,
    pub lazy_init: bool,
}

impl Default for ScanSpec {
    fn default() -> Self {
        Self {
            base_packages: Vec::new(),
            base_package_types: Vec::new(),
            include_filters: Vec::new(),
            exclude_filters: Vec::new(),
            use_default_filters: true,
            lazy_init: false,
        }
    }
}

impl ScanSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_package(mut self, package: impl Into<String>) -> Self {
        self.base_packages.push(package.into());
        self
    }

    pub fn with_base_package_type(mut self, type_name: impl Into<String>) -> Self {
        self.base_package_types.push(type_name.into());
        self
    }

    pub fn include(mut self, filter: TypeFilter) -> Self {
        self.include_filters.push(filter);
        self
    }

    pub fn exclude(mut self, filter: TypeFilter) -> Self {
        self.exclude_filters.push(filter);
        self
    }

    pub fn without_default_filters(mut self) -> Self {
        self.use_default_filters = false;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy_init = true;
        self
    }
}

/// Resolves `${...}` placeholders in base package expressions
pub trait PlaceholderResolver: Send + Sync {
    fn resolve_placeholders(&self, text: &str) -> String;
}

/// Leaves text untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityResolver;

impl PlaceholderResolver for IdentityResolver {
    fn resolve_placeholders(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Resolves placeholders from a fixed map, leaving unknown ones in place
#[derive(Debug, Default, Clone)]
pub struct MapPlaceholderResolver {
    values: std::collections::HashMap<String, String>,
}

impl MapPlaceholderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl PlaceholderResolver for MapPlaceholderResolver {
    fn resolve_placeholders(&self, text: &str) -> String {
        let mut resolved = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            resolved.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.values.get(key) {
                        Some(value) => resolved.push_str(value),
                        None => resolved.push_str(&rest[start..start + 2 + end + 1]),
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    resolved.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        resolved.push_str(rest);
        resolved
    }
}

/// Default component name: the simple type name with its first letter lowercased
pub fn default_component_name(type_name: &str) -> String {
    let simple = type_name.rsplit('.').next().unwrap_or(type_name);
    let mut chars = simple.chars();
    match chars.next() {
        // Names starting with two capitals keep their case
        Some(first) if chars.clone().next().is_some_and(char::is_uppercase) && first.is_uppercase() => {
            simple.to_string()
        }
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct ComponentScanner<'a> {
    catalog: &'a MetadataCatalog,
    resolver: &'a dyn PlaceholderResolver,
}

impl<'a> ComponentScanner<'a> {
    pub fn new(catalog: &'a MetadataCatalog, resolver: &'a dyn PlaceholderResolver) -> Self {
        Self { catalog, resolver }
    }

    /// Packages a spec declared on `declaring_type` covers, in declaration order
    pub fn base_packages(&self, spec: &ScanSpec, declaring_type: &str) -> Vec<String> {
        let mut packages: Vec<String> = Vec::new();
        {
            let mut push = |package: &str| {
                if !packages.iter().any(|existing| existing == package) {
                    packages.push(package.to_string());
                }
            };

            for expression in &spec.base_packages {
                let resolved = self.resolver.resolve_placeholders(expression);
                resolved
                    .split(PACKAGE_DELIMITERS)
                    .map(str::trim)
                    .filter(|package| !package.is_empty())
                    .for_each(&mut push);
            }
            for type_name in &spec.base_package_types {
                push(package_of(type_name));
            }
        }
        if packages.is_empty() {
            packages.push(package_of(declaring_type).to_string());
        }
        packages
    }

    /// Descriptors for every catalog type the spec selects. The declaring
    /// type is always excluded.
    pub fn scan(&self, spec: &ScanSpec, declaring_type: &str) -> ContainerResult<Vec<(String, Descriptor)>> {
        let mut includes = spec.include_filters.clone();
        if spec.use_default_filters {
            includes.push(TypeFilter::stereotype("component"));
        }
        let excludes = &spec.exclude_filters;

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for package in self.base_packages(spec, declaring_type) {
            for metadata in self.catalog.types_in_package(&package) {
                if !seen.insert(metadata.type_name.as_str()) {
                    continue;
                }
                if metadata.type_name == declaring_type
                    || excludes.iter().any(|filter| filter.matches(metadata))
                {
                    debug!(type_name = %metadata.type_name, "Excluded from component scan");
                    continue;
                }
                if metadata.is_interface || !includes.iter().any(|filter| filter.matches(metadata)) {
                    continue;
                }

                let mut descriptor = metadata.to_descriptor();
                if spec.lazy_init {
                    descriptor.set_lazy_init(true);
                }
                found.push((default_component_name(&metadata.type_name), descriptor));
            }
        }

        debug!(
            declaring_type = %declaring_type,
            found = found.len(),
            "Component scan complete"
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MetadataCatalog {
        MetadataCatalog::new()
            .with_type(TypeMetadata::new("app.AppConfig").full_configuration())
            .with_type(TypeMetadata::new("app.orders.OrderService").with_stereotype("service"))
            .with_type(TypeMetadata::new("app.orders.OrderRepository").with_stereotype("repository"))
            .with_type(TypeMetadata::new("app.orders.OrderHelper"))
            .with_type(
                TypeMetadata::new("app.orders.PaymentGateway")
                    .with_supertype("app.Gateway"),
            )
            .with_type(TypeMetadata::new("app.orders.Api").with_stereotype("component").interface())
            .with_type(TypeMetadata::new("app.billing.Invoicer").with_stereotype("component"))
    }

    fn names(found: &[(String, Descriptor)]) -> Vec<&str> {
        found.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[test]
    fn test_default_filters_scan_declaring_package() {
        let catalog = catalog();
        let scanner = ComponentScanner::new(&catalog, &IdentityResolver);

        let found = scanner.scan(&ScanSpec::new(), "app.AppConfig").unwrap();

        assert_eq!(names(&found), vec!["invoicer", "orderRepository", "orderService"]);
    }

    #[test]
    fn test_include_exclude_filters() {
        let catalog = catalog();
        let scanner = ComponentScanner::new(&catalog, &IdentityResolver);
        let spec = ScanSpec::new()
            .with_base_package("app.orders")
            .include(TypeFilter::assignable("app.Gateway"))
            .include(TypeFilter::regex(r".*Helper").unwrap())
            .exclude(TypeFilter::stereotype("repository"))
            .lazy();

        let found = scanner.scan(&spec, "app.AppConfig").unwrap();

        assert_eq!(names(&found), vec!["orderHelper", "orderService", "paymentGateway"]);
        assert!(found.iter().all(|(_, descriptor)| descriptor.is_lazy_init()));
    }

    #[test]
    fn test_custom_filter_without_defaults() {
        let catalog = catalog();
        let scanner = ComponentScanner::new(&catalog, &IdentityResolver);
        let spec = ScanSpec::new()
            .with_base_package("app")
            .without_default_filters()
            .include(TypeFilter::custom(|metadata: &TypeMetadata| {
                metadata.type_name.ends_with("Invoicer")
            }));

        let found = scanner.scan(&spec, "app.AppConfig").unwrap();
        assert_eq!(names(&found), vec!["invoicer"]);
    }

    #[test]
    fn test_placeholder_and_delimited_packages() {
        let catalog = catalog();
        let resolver = MapPlaceholderResolver::new().with_value("billing.package", "app.billing");
        let scanner = ComponentScanner::new(&catalog, &resolver);
        let spec = ScanSpec::new().with_base_package("${billing.package}; app.orders , app.billing");

        assert_eq!(
            scanner.base_packages(&spec, "app.AppConfig"),
            vec!["app.billing".to_string(), "app.orders".to_string()]
        );
    }

    #[test]
    fn test_base_packages_fall_back_to_declaring_package() {
        let catalog = catalog();
        let scanner = ComponentScanner::new(&catalog, &IdentityResolver);

        assert_eq!(scanner.base_packages(&ScanSpec::new(), "app.orders.OrdersConfig"), vec!["app.orders"]);
        assert_eq!(
            scanner.base_packages(&ScanSpec::new().with_base_package(" ; "), "app.AppConfig"),
            vec!["app"]
        );
    }

    #[test]
    fn test_declaring_type_is_excluded() {
        let catalog = catalog();
        let scanner = ComponentScanner::new(&catalog, &IdentityResolver);

        let found = scanner
            .scan(&ScanSpec::new().with_base_package("app"), "app.AppConfig")
            .unwrap();

        assert!(!names(&found).contains(&"appConfig"));
    }

    #[test]
    fn test_invalid_regex_is_configuration_error() {
        let result = TypeFilter::regex("(unclosed");
        assert!(matches!(result, Err(ContainerError::Configuration(_))));
    }

    #[test]
    fn test_default_component_name() {
        assert_eq!(default_component_name("app.orders.OrderService"), "orderService");
        assert_eq!(default_component_name("URLResolver"), "URLResolver");
        assert_eq!(default_component_name("app.X"), "x");
    }
}
