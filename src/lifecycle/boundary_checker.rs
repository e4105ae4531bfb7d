//! Detects components created before the interceptor chain is complete.

use crate::error::ContainerResult;
use crate::lifecycle::{CreationContext, LifecycleInterceptor};
use crate::registry::{Component, Role};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Installed first during interceptor registration. Any application
/// component created while fewer than `target_count` interceptors are
/// installed did not pass through the full chain; the checker records it
/// and logs an advisory.
#[derive(Debug)]
pub struct BoundaryChecker {
    target_count: usize,
    log_advisories: bool,
    early_instances: Mutex<Vec<String>>,
}

impl BoundaryChecker {
    pub fn new(target_count: usize, log_advisories: bool) -> Self {
        Self {
            target_count,
            log_advisories,
            early_instances: Mutex::new(Vec::new()),
        }
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Names of components created too early, in creation order
    pub fn early_instances(&self) -> Vec<String> {
        self.early_instances.lock().clone()
    }
}

impl LifecycleInterceptor for BoundaryChecker {
    fn name(&self) -> &str {
        "BoundaryChecker"
    }

    fn after_initialization(
        &self,
        instance: Arc<dyn Component>,
        context: &CreationContext,
    ) -> ContainerResult<Arc<dyn Component>> {
        let is_interceptor = instance.clone().as_lifecycle_interceptor().is_some();
        if !is_interceptor
            && context.role != Role::Infrastructure
            && context.installed_interceptors < self.target_count
        {
            if self.log_advisories {
                info!(
                    component = %context.name,
                    type_name = %context.type_name,
                    installed = context.installed_interceptors,
                    target = self.target_count,
                    "Component '{}' is not eligible for processing by all lifecycle interceptors (for example: not eligible for wrapping)",
                    context.name
                );
            }
            self.early_instances.lock().push(context.name.clone());
        }
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ValueComponent;

    fn context(name: &str, role: Role, installed: usize) -> CreationContext {
        CreationContext {
            name: name.to_string(),
            type_name: "app.Thing".to_string(),
            role,
            installed_interceptors: installed,
        }
    }

    fn component() -> Arc<dyn Component> {
        Arc::new(ValueComponent::new("app.Thing", ()))
    }

    #[test]
    fn test_flags_application_components_below_target() {
        let checker = BoundaryChecker::new(3, false);
        checker
            .after_initialization(component(), &context("early", Role::Application, 1))
            .unwrap();
        checker
            .after_initialization(component(), &context("late", Role::Application, 3))
            .unwrap();

        assert_eq!(checker.early_instances(), vec!["early"]);
    }

    #[test]
    fn test_ignores_infrastructure_components() {
        let checker = BoundaryChecker::new(3, false);
        checker
            .after_initialization(component(), &context("infra", Role::Infrastructure, 0))
            .unwrap();
        assert!(checker.early_instances().is_empty());
    }

    #[test]
    fn test_ignores_interceptors() {
        let checker = Arc::new(BoundaryChecker::new(5, false));
        let as_component: Arc<dyn Component> = Arc::new(InterceptorComponent);
        checker
            .after_initialization(as_component, &context("interceptor", Role::Application, 1))
            .unwrap();
        assert!(checker.early_instances().is_empty());
    }

    struct InterceptorComponent;

    impl LifecycleInterceptor for InterceptorComponent {
        fn name(&self) -> &str {
            "InterceptorComponent"
        }
    }

    impl Component for InterceptorComponent {
        fn as_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
            self
        }

        fn as_lifecycle_interceptor(self: Arc<Self>) -> Option<Arc<dyn LifecycleInterceptor>> {
            Some(self)
        }
    }
}
