//! # Transactional Interception
//!
//! Per-invocation transaction demarcation for blocking and asynchronous
//! invocations.
//!
//! ## Architecture
//!
//! ```text
//! TransactionInterceptor
//! ├── AttributeSource      (is this joinpoint transactional, and how)
//! ├── ManagerLookup        (qualifier / default resolution, cached)
//! ├── TransactionManager   (platform | callback-preferring | reactive)
//! └── TransactionInfo      (thread-local stack / task-local for async)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use stratum_core::test_helpers::RecordingTransactionManager;
//! use stratum_core::transaction::{
//!     current_transaction_status, MethodId, NameMatchAttributeSource, TransactionAttribute,
//!     TransactionInterceptor, TransactionManager,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let interceptor = TransactionInterceptor::builder()
//!     .attribute_source(Arc::new(
//!         NameMatchAttributeSource::new().with_method("place*", TransactionAttribute::new()),
//!     ))
//!     .manager(TransactionManager::platform(RecordingTransactionManager::new()))
//!     .build()?;
//!
//! let method = MethodId::new("app.OrderService", "placeOrder");
//! let name = interceptor.invoke_within_transaction(&method, None, || {
//!     let status = current_transaction_status().expect("transaction in scope");
//!     Ok(status.name().to_string())
//! })?;
//! assert_eq!(name, "app.OrderService.placeOrder");
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod attribute_source;
pub mod info;
pub mod interceptor;
pub mod lookup;
pub mod manager;
pub mod reactive;
pub mod status;

pub use attribute::{Isolation, Propagation, RollbackRule, TransactionAttribute};
pub use attribute_source::{
    simple_match, AttributeSource, CompositeAttributeSource, MethodId, MethodMapAttributeSource,
    NameMatchAttributeSource,
};
pub use info::{current_transaction_info, current_transaction_status, TransactionInfo};
pub use interceptor::{TransactionInterceptor, TransactionInterceptorBuilder};
pub use lookup::{ManagerLookup, StaticManagerLookup};
pub use manager::{
    CallbackPreferringTransactionManager, PlatformTransactionManager, ReactiveTransactionManager,
    TransactionCallback, TransactionManager,
};
pub use reactive::{current_reactive_status, current_reactive_transaction};
pub use status::TransactionStatus;
