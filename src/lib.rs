#![allow(clippy::doc_markdown)] // Allow technical terms like RegistryMutator in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Stratum Core
//!
//! Container extension pipeline and transactional interception for a
//! component container.
//!
//! ## Overview
//!
//! Stratum Core drives a definition registry from raw component descriptors
//! to a refreshed container. Registry mutators and factory finalizers run in
//! a deterministic tiered order, lifecycle interceptors are installed in
//! their final order, and invocations of transactional components are
//! demarcated by a [`transaction::TransactionInterceptor`].
//!
//! ## Key Features
//!
//! - **Tiered Processor Ordering**: priority-ordered, ordered, then unordered,
//!   with a fixpoint loop for mutators registered by other mutators
//! - **Interceptor Registration**: boundary checker first, merged-aware
//!   interceptors last, listener detection at the very end
//! - **Configuration Classes**: full and lite configurations, component
//!   scanning and imports, expanded before any other mutator sees the registry
//! - **Transaction Demarcation**: blocking, callback-preferring and async
//!   managers with qualifier-based lookup and rule-based rollback
//!
//! ## Module Organization
//!
//! - [`bootstrap`] - Startup control flow and its report
//! - [`pipeline`] - Registry mutator and factory finalizer ordering
//! - [`lifecycle`] - Lifecycle-interceptor registration
//! - [`registry`] - Descriptors, components and the in-memory registry
//! - [`configuration`] - Configuration-class processing and component scanning
//! - [`transaction`] - Transactional interception
//! - [`events`] - Application events and listeners
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use stratum_core::bootstrap::ContainerBootstrap;
//! use stratum_core::config::StratumConfig;
//! use stratum_core::registry::{Component, DefaultComponentRegistry, DefinitionRegistry, Descriptor, ValueComponent};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = DefaultComponentRegistry::new();
//! registry.register_descriptor(
//!     "clock",
//!     Descriptor::new("app.Clock")
//!         .with_factory(|_| Ok(Arc::new(ValueComponent::new("app.Clock", 0_u64)) as Arc<dyn Component>)),
//! )?;
//!
//! let report = ContainerBootstrap::new(StratumConfig::default()).run(&registry)?;
//! assert_eq!(report.preinstantiated, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and doc tests
//! ```

pub mod bootstrap;
pub mod config;
pub mod configuration;
pub mod constants;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod ordering;
pub mod pipeline;
pub mod registry;
pub mod test_helpers;
pub mod transaction;

pub use crate::bootstrap::{BootstrapReport, BootstrapTimings, ContainerBootstrap};
pub use crate::config::{ConfigManager, ContainerConfig, LoggingConfig, StratumConfig, TransactionConfig};
pub use crate::error::{
    ApplicationError, ContainerError, ContainerResult, FailureKind, InvocationError, Result,
    StratumError, TransactionError, TransactionResult,
};
pub use crate::registry::{Component, DefaultComponentRegistry, DefinitionRegistry, Descriptor};
pub use crate::transaction::{TransactionAttribute, TransactionInterceptor, TransactionManager};
