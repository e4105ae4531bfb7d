//! # Configuration-Class Processing
//!
//! Expands configuration descriptors into the components they declare
//! (factory methods, imports and component scans) and distinguishes full
//! configurations, whose sibling factory-method calls resolve to canonical
//! singletons, from lite ones.
//!
//! ## Architecture
//!
//! ```text
//! ConfigurationProcessor (Priority-Ordered registry mutator)
//! ├── MetadataIntrospector  (candidate / order / declared definitions)
//! │   └── MetadataCatalog   (in-memory type index)
//! └── ComponentScanner      (package scan with type filters)
//! ```

pub mod metadata;
pub mod processor;
pub mod scanner;

pub use metadata::{
    check_configuration_candidate, configuration_order, ConfigurationMarker, FactoryMethod,
    MetadataCatalog, MetadataIntrospector, TypeMetadata,
};
pub use processor::ConfigurationProcessor;
pub use scanner::{
    default_component_name, ComponentScanner, IdentityResolver, MapPlaceholderResolver,
    PlaceholderResolver, ScanSpec, TypeFilter, TypeMatcher,
};
