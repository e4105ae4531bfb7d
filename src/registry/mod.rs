//! # Registry Infrastructure
//!
//! Descriptor storage, component materialization, and the installed
//! lifecycle interceptor chain.
//!
//! ## Architecture
//!
//! ```text
//! Registry Infrastructure
//! ├── Descriptor                (pre-instantiation record + attribute bag)
//! ├── DefinitionRegistry        (contract consumed by the pipeline)
//! ├── DefaultComponentRegistry  (in-memory implementation)
//! └── InterceptorChain          (copy-on-write interceptor list)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use stratum_core::registry::{
//!     Component, DefaultComponentRegistry, DefinitionRegistry, Descriptor, ValueComponent,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = DefaultComponentRegistry::new();
//! registry.register_descriptor(
//!     "greeting",
//!     Descriptor::new("app.Greeting").with_factory(|_| {
//!         Ok(Arc::new(ValueComponent::new("app.Greeting", "hello")) as Arc<dyn Component>)
//!     }),
//! )?;
//!
//! let greeting = registry.get_component("greeting")?;
//! assert_eq!(greeting.type_name(), "app.Greeting");
//! # Ok(())
//! # }
//! ```

pub mod component;
pub mod component_registry;
pub mod definition_registry;
pub mod descriptor;
pub mod interceptor_chain;

pub use component::{downcast_component, Component, ValueComponent};
pub use component_registry::{DefaultComponentRegistry, RegistryStats};
pub use definition_registry::{DefinitionRegistry, RegistryId};
pub use descriptor::{factory, Capability, ComponentFactory, Descriptor, FactoryContext, Role, Scope};
pub use interceptor_chain::InterceptorChain;
