//! # Lifecycle Interceptors
//!
//! Per-instance hooks applied by the registry around component creation,
//! and the one-time registration step that installs them in order.

pub mod boundary_checker;
pub mod interceptor;
pub mod listener_detector;
pub mod registration;

pub use boundary_checker::BoundaryChecker;
pub use interceptor::{same_interceptor, CreationContext, LifecycleInterceptor};
pub use listener_detector::ListenerDetector;
pub use registration::{register_lifecycle_interceptors, InterceptorRegistrar, RegistrationReport};
