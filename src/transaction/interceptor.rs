//! # Transaction Interceptor
//!
//! Wraps invocations with transaction demarcation. Resolves the attribute
//! for the joinpoint, resolves the manager, then drives one of three paths:
//!
//! - **Standard**: begin, invoke, then commit or roll back per the
//!   attribute's rollback predicate.
//! - **Callback-preferring**: the manager drives the invocation; the
//!   interceptor only decides rollback from inside the callback.
//! - **Reactive**: see [`invoke_within_transaction_async`](TransactionInterceptor::invoke_within_transaction_async).
//!
//! Failures raised by the invocation reach the caller unchanged unless a
//! commit or rollback failure supersedes them, in which case the
//! application error travels along as context of the transaction error.

use crate::config::TransactionConfig;
use crate::constants::DEFAULT_MANAGER_KEY;
use crate::error::{ApplicationError, InvocationError, TransactionError, TransactionResult};
use crate::logging::log_transaction_operation;
use crate::transaction::attribute::TransactionAttribute;
use crate::transaction::attribute_source::{AttributeSource, MethodId};
use crate::transaction::info::{bind_to_thread, TransactionInfo};
use crate::transaction::lookup::ManagerLookup;
use crate::transaction::manager::{
    CallbackPreferringTransactionManager, PlatformTransactionManager, TransactionManager,
};
use crate::transaction::status::TransactionStatus;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

pub struct TransactionInterceptor {
    attribute_source: Arc<dyn AttributeSource>,
    manager: Option<TransactionManager>,
    manager_lookup: Option<Arc<dyn ManagerLookup>>,
    default_manager_name: Option<String>,
    default_timeout: Option<Duration>,
    manager_cache: DashMap<String, TransactionManager>,
}

#[derive(Default)]
pub struct TransactionInterceptorBuilder {
    attribute_source: Option<Arc<dyn AttributeSource>>,
    manager: Option<TransactionManager>,
    manager_lookup: Option<Arc<dyn ManagerLookup>>,
    default_manager_name: Option<String>,
    default_timeout: Option<Duration>,
}

impl TransactionInterceptorBuilder {
    pub fn attribute_source(mut self, source: Arc<dyn AttributeSource>) -> Self {
        self.attribute_source = Some(source);
        self
    }

    /// Manager used when an attribute carries no qualifier and no default name is set
    pub fn manager(mut self, manager: TransactionManager) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn manager_lookup(mut self, lookup: Arc<dyn ManagerLookup>) -> Self {
        self.manager_lookup = Some(lookup);
        self
    }

    pub fn default_manager_name(mut self, name: impl Into<String>) -> Self {
        self.default_manager_name = Some(name.into());
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Apply configured defaults; explicit builder calls made earlier are overridden
    pub fn with_config(mut self, config: &TransactionConfig) -> Self {
        if let Some(name) = &config.default_manager_name {
            self.default_manager_name = Some(name.clone());
        }
        if let Some(timeout) = config.default_timeout() {
            self.default_timeout = Some(timeout);
        }
        self
    }

    pub fn build(self) -> TransactionResult<TransactionInterceptor> {
        let attribute_source = self.attribute_source.ok_or_else(|| {
            TransactionError::Configuration("an attribute source is required".to_string())
        })?;
        if self.manager.is_none() && self.manager_lookup.is_none() && self.default_manager_name.is_none() {
            return Err(TransactionError::Configuration(
                "a transaction manager, a manager lookup or a default manager name is required".to_string(),
            ));
        }
        if let Some(name) = &self.default_manager_name {
            if name.trim().is_empty() {
                return Err(TransactionError::Configuration(
                    "default manager name must not be blank".to_string(),
                ));
            }
            if self.manager_lookup.is_none() {
                return Err(TransactionError::Configuration(format!(
                    "default manager name '{name}' requires a manager lookup"
                )));
            }
        }

        Ok(TransactionInterceptor {
            attribute_source,
            manager: self.manager,
            manager_lookup: self.manager_lookup,
            default_manager_name: self.default_manager_name,
            default_timeout: self.default_timeout,
            manager_cache: DashMap::new(),
        })
    }
}

impl TransactionInterceptor {
    pub fn builder() -> TransactionInterceptorBuilder {
        TransactionInterceptorBuilder::default()
    }

    /// Attribute for the joinpoint with interceptor defaults applied
    pub(crate) fn resolve_attribute(
        &self,
        method: &MethodId,
        target_type: Option<&str>,
        joinpoint: &str,
    ) -> Option<TransactionAttribute> {
        self.attribute_source
            .get_attribute(method, target_type)
            .map(|mut attribute| {
                if attribute.timeout.is_none() {
                    attribute.timeout = self.default_timeout;
                }
                attribute.with_default_name(joinpoint)
            })
    }

    /// Manager for `attribute`: by qualifier, then by the configured default
    /// name, then the configured manager, then the single manager the lookup
    /// knows. Lookups are cached until [`clear_manager_cache`](Self::clear_manager_cache).
    pub fn determine_manager(&self, attribute: &TransactionAttribute) -> TransactionResult<TransactionManager> {
        if let Some(qualifier) = attribute.qualifier.as_deref().filter(|q| !q.is_empty()) {
            return self.cached_lookup(qualifier, |lookup| lookup.lookup_by_qualifier(qualifier));
        }
        if let Some(name) = self.default_manager_name.as_deref() {
            return self.cached_lookup(name, |lookup| lookup.lookup_by_qualifier(name));
        }
        if let Some(manager) = &self.manager {
            return Ok(manager.clone());
        }
        self.cached_lookup(DEFAULT_MANAGER_KEY, |lookup| lookup.lookup_default())
    }

    fn cached_lookup<F>(&self, key: &str, resolve: F) -> TransactionResult<TransactionManager>
    where
        F: FnOnce(&dyn ManagerLookup) -> TransactionResult<TransactionManager>,
    {
        if let Some(cached) = self.manager_cache.get(key) {
            return Ok(cached.value().clone());
        }
        let lookup = self
            .manager_lookup
            .as_deref()
            .ok_or_else(|| TransactionError::ManagerNotFound {
                qualifier: key.to_string(),
            })?;
        let manager = resolve(lookup)?;
        Ok(self
            .manager_cache
            .entry(key.to_string())
            .or_insert(manager)
            .value()
            .clone())
    }

    /// Drop every cached manager resolution
    pub fn clear_manager_cache(&self) {
        self.manager_cache.clear();
    }

    pub fn cached_manager_count(&self) -> usize {
        self.manager_cache.len()
    }

    /// Run a blocking invocation within the transaction its attribute
    /// describes. Non-transactional joinpoints run as-is.
    pub fn invoke_within_transaction<T, F>(
        &self,
        method: &MethodId,
        target_type: Option<&str>,
        invocation: F,
    ) -> Result<T, InvocationError>
    where
        F: FnOnce() -> Result<T, ApplicationError>,
    {
        let joinpoint = method.qualified_name(target_type);
        let Some(attribute) = self.resolve_attribute(method, target_type, &joinpoint) else {
            let _binding = bind_to_thread(TransactionInfo::non_transactional(&joinpoint));
            return invocation().map_err(InvocationError::from);
        };

        match self.determine_manager(&attribute)? {
            TransactionManager::Platform(manager) => {
                self.invoke_standard(manager, attribute, joinpoint, invocation)
            }
            TransactionManager::CallbackPreferring(manager) => {
                self.invoke_with_callback(manager, attribute, joinpoint, invocation)
            }
            TransactionManager::Reactive(manager) => Err(TransactionError::UnsupportedInvocationShape {
                reason: format!(
                    "reactive transaction manager '{}' cannot demarcate a blocking invocation",
                    manager.name()
                ),
                joinpoint,
            }
            .into()),
        }
    }

    fn invoke_standard<T, F>(
        &self,
        manager: Arc<dyn PlatformTransactionManager>,
        attribute: TransactionAttribute,
        joinpoint: String,
        invocation: F,
    ) -> Result<T, InvocationError>
    where
        F: FnOnce() -> Result<T, ApplicationError>,
    {
        let status = manager.get_transaction(&attribute)?;
        log_transaction_operation("begin", &joinpoint, Some(status.name()), "started", None);

        let binding = bind_to_thread(TransactionInfo::new(
            Some(TransactionManager::Platform(Arc::clone(&manager))),
            Some(attribute.clone()),
            &joinpoint,
            Some(Arc::clone(&status)),
        ));
        let mut unwind_guard = RollbackOnUnwind {
            manager: manager.as_ref(),
            status: &status,
            joinpoint: &joinpoint,
            armed: true,
        };
        let result = invocation();
        unwind_guard.armed = false;

        match result {
            Ok(value) => {
                drop(binding);
                log_transaction_operation("commit", &joinpoint, Some(status.name()), "committing", None);
                manager.commit(&status)?;
                Ok(value)
            }
            Err(application_error) => {
                let outcome = complete_after_failure(manager.as_ref(), &status, &attribute, &joinpoint, application_error);
                drop(binding);
                Err(outcome)
            }
        }
    }

    fn invoke_with_callback<T, F>(
        &self,
        manager: Arc<dyn CallbackPreferringTransactionManager>,
        attribute: TransactionAttribute,
        joinpoint: String,
        invocation: F,
    ) -> Result<T, InvocationError>
    where
        F: FnOnce() -> Result<T, ApplicationError>,
    {
        let mut value: Option<T> = None;
        let mut held_error: Option<ApplicationError> = None;

        let outcome = {
            let value_slot = &mut value;
            let held_slot = &mut held_error;
            let info_manager = TransactionManager::CallbackPreferring(Arc::clone(&manager));
            let attribute_ref = &attribute;
            let joinpoint_ref = joinpoint.as_str();

            manager.execute(
                &attribute,
                Box::new(move |status: &Arc<TransactionStatus>| {
                    let _binding = bind_to_thread(TransactionInfo::new(
                        Some(info_manager),
                        Some(attribute_ref.clone()),
                        joinpoint_ref,
                        Some(Arc::clone(status)),
                    ));
                    log_transaction_operation("execute", joinpoint_ref, Some(status.name()), "in_callback", None);
                    match invocation() {
                        Ok(result) => {
                            *value_slot = Some(result);
                            Ok(())
                        }
                        Err(failure) if attribute_ref.rollback_on(&failure) => Err(failure),
                        Err(failure) => {
                            // Commit, then surface the failure after the manager returns
                            *held_slot = Some(failure);
                            Ok(())
                        }
                    }
                }),
            )
        };

        match outcome {
            Err(failure) => Err(match held_error {
                Some(application_error) => supersede(failure, application_error, &joinpoint),
                None => failure.into(),
            }),
            Ok(Some(rolled_back)) => Err(rolled_back.into()),
            Ok(None) => match held_error {
                Some(application_error) => Err(application_error.into()),
                None => value.ok_or_else(|| {
                    InvocationError::from(TransactionError::system(format!(
                        "manager '{}' completed '{joinpoint}' without running the invocation",
                        manager.name()
                    )))
                }),
            },
        }
    }
}

/// Roll back or commit after the invocation failed, keeping the failure
/// unless completion itself fails
fn complete_after_failure(
    manager: &dyn PlatformTransactionManager,
    status: &Arc<TransactionStatus>,
    attribute: &TransactionAttribute,
    joinpoint: &str,
    application_error: ApplicationError,
) -> InvocationError {
    if attribute.rollback_on(&application_error) {
        log_transaction_operation(
            "rollback",
            joinpoint,
            Some(status.name()),
            "rolling_back",
            Some(application_error.label()),
        );
        match manager.rollback(status) {
            Ok(()) => application_error.into(),
            Err(failure) => supersede(failure, application_error, joinpoint),
        }
    } else {
        log_transaction_operation(
            "commit",
            joinpoint,
            Some(status.name()),
            "committing_despite_failure",
            Some(application_error.label()),
        );
        match manager.commit(status) {
            Ok(()) => application_error.into(),
            Err(failure) => supersede(failure, application_error, joinpoint),
        }
    }
}

/// A completion failure replaces the application error, which is kept as context
pub(crate) fn supersede(
    failure: TransactionError,
    application_error: ApplicationError,
    joinpoint: &str,
) -> InvocationError {
    error!(
        joinpoint = %joinpoint,
        application_error = %application_error,
        completion_error = %failure,
        "Application failure overridden by transaction completion failure"
    );
    let failure = match failure {
        TransactionError::CommitFailure { .. }
        | TransactionError::RollbackFailure { .. }
        | TransactionError::System { .. } => failure,
        other => TransactionError::system(other),
    };
    failure.with_application_error(application_error).into()
}

struct RollbackOnUnwind<'a> {
    manager: &'a dyn PlatformTransactionManager,
    status: &'a Arc<TransactionStatus>,
    joinpoint: &'a str,
    armed: bool,
}

impl Drop for RollbackOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed && std::thread::panicking() {
            warn!(joinpoint = %self.joinpoint, "Invocation panicked, rolling back transaction");
            if let Err(e) = self.manager.rollback(self.status) {
                error!(joinpoint = %self.joinpoint, error = %e, "Rollback after panic failed");
            }
        }
    }
}

impl fmt::Debug for TransactionInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionInterceptor")
            .field("manager", &self.manager)
            .field("has_manager_lookup", &self.manager_lookup.is_some())
            .field("default_manager_name", &self.default_manager_name)
            .field("default_timeout", &self.default_timeout)
            .field("cached_managers", &self.manager_cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::test_helpers::{
        CallbackTransactionManager, ManagerCall, RecordingReactiveManager, RecordingTransactionManager,
    };
    use crate::transaction::attribute::Propagation;
    use crate::transaction::attribute_source::NameMatchAttributeSource;
    use crate::transaction::info::{current_transaction_info, current_transaction_status};
    use crate::transaction::lookup::StaticManagerLookup;

    fn source() -> Arc<dyn AttributeSource> {
        Arc::new(
            NameMatchAttributeSource::new()
                .with_method("place*", TransactionAttribute::new())
                .with_method("audit", TransactionAttribute::new().with_propagation(Propagation::RequiresNew))
                .with_method("report", TransactionAttribute::new().with_qualifier("reporting")),
        )
    }

    fn interceptor(manager: &Arc<RecordingTransactionManager>) -> TransactionInterceptor {
        TransactionInterceptor::builder()
            .attribute_source(source())
            .manager(TransactionManager::Platform(manager.clone()))
            .build()
            .unwrap()
    }

    fn method(name: &str) -> MethodId {
        MethodId::new("app.OrderService", name)
    }

    #[test]
    fn test_commit_on_success() {
        let manager = Arc::new(RecordingTransactionManager::new());
        let interceptor = interceptor(&manager);

        let value = interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || {
                assert_eq!(current_transaction_status().unwrap().name(), "app.OrderService.placeOrder");
                Ok(42)
            })
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(
            manager.calls(),
            vec![
                ManagerCall::Begin("app.OrderService.placeOrder".to_string()),
                ManagerCall::Commit("app.OrderService.placeOrder".to_string()),
            ]
        );
        assert!(current_transaction_info().is_none());
    }

    #[test]
    fn test_runtime_failure_rolls_back_and_propagates() {
        let manager = Arc::new(RecordingTransactionManager::new());
        let interceptor = interceptor(&manager);

        let error = interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || -> Result<(), _> {
                Err(ApplicationError::runtime("IllegalState", "boom"))
            })
            .unwrap_err();

        assert_eq!(error.as_application().unwrap().label(), "IllegalState");
        assert_eq!(manager.rollback_count(), 1);
        assert_eq!(manager.commit_count(), 0);
    }

    #[test]
    fn test_checked_failure_commits_and_propagates() {
        let manager = Arc::new(RecordingTransactionManager::new());
        let interceptor = interceptor(&manager);

        let error = interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || -> Result<(), _> {
                Err(ApplicationError::checked("IoFailure", "disk"))
            })
            .unwrap_err();

        assert_eq!(error.as_application().unwrap().kind(), FailureKind::Checked);
        assert_eq!(manager.commit_count(), 1);
        assert_eq!(manager.rollback_count(), 0);
    }

    #[test]
    fn test_non_transactional_invocation_still_stacks() {
        let manager = Arc::new(RecordingTransactionManager::new());
        let interceptor = interceptor(&manager);

        interceptor
            .invoke_within_transaction(&method("lookup"), None, || {
                let info = current_transaction_info().unwrap();
                assert_eq!(info.joinpoint(), "app.OrderService.lookup");
                assert!(!info.has_transaction());
                Ok(())
            })
            .unwrap();

        assert!(manager.calls().is_empty());
        assert!(current_transaction_info().is_none());
    }

    #[test]
    fn test_commit_failure_keeps_application_error_as_context() {
        let manager = Arc::new(RecordingTransactionManager::new().failing_commit());
        let interceptor = interceptor(&manager);

        let error = interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || -> Result<(), _> {
                Err(ApplicationError::checked("IoFailure", "disk"))
            })
            .unwrap_err();

        let failure = error.as_transaction().unwrap();
        assert!(matches!(failure, TransactionError::CommitFailure { .. }));
        assert_eq!(failure.application_error().unwrap().label(), "IoFailure");
    }

    #[test]
    fn test_rollback_failure_supersedes_application_error() {
        let manager = Arc::new(RecordingTransactionManager::new().failing_rollback());
        let interceptor = interceptor(&manager);

        let error = interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || -> Result<(), _> {
                Err(ApplicationError::runtime("IllegalState", "boom"))
            })
            .unwrap_err();

        let failure = error.as_transaction().unwrap();
        assert!(matches!(failure, TransactionError::RollbackFailure { .. }));
        assert_eq!(failure.application_error().unwrap().label(), "IllegalState");
    }

    #[test]
    fn test_panic_rolls_back() {
        let manager = Arc::new(RecordingTransactionManager::new());
        let interceptor = interceptor(&manager);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = interceptor.invoke_within_transaction(&method("placeOrder"), None, || -> Result<(), _> {
                panic!("invocation panicked")
            });
        }));

        assert!(result.is_err());
        assert_eq!(manager.rollback_count(), 1);
        assert!(current_transaction_info().is_none());
    }

    #[test]
    fn test_callback_preferring_path() {
        let manager = Arc::new(CallbackTransactionManager::new());
        let interceptor = TransactionInterceptor::builder()
            .attribute_source(source())
            .manager(TransactionManager::CallbackPreferring(manager.clone()))
            .build()
            .unwrap();

        let value = interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || {
                assert!(current_transaction_status().is_ok());
                Ok("done")
            })
            .unwrap();
        assert_eq!(value, "done");

        let rolled_back = interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || -> Result<(), _> {
                Err(ApplicationError::runtime("IllegalState", "boom"))
            })
            .unwrap_err();
        assert_eq!(rolled_back.as_application().unwrap().label(), "IllegalState");

        let committed = interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || -> Result<(), _> {
                Err(ApplicationError::checked("IoFailure", "disk"))
            })
            .unwrap_err();
        assert_eq!(committed.as_application().unwrap().label(), "IoFailure");

        assert_eq!(manager.commit_count(), 2);
        assert_eq!(manager.rollback_count(), 1);
    }

    #[test]
    fn test_qualifier_resolution_is_cached() {
        let reporting = Arc::new(RecordingTransactionManager::new());
        let lookup = Arc::new(
            StaticManagerLookup::new()
                .with_qualified_manager("reportingTm", ["reporting"], TransactionManager::Platform(reporting.clone())),
        );
        let interceptor = TransactionInterceptor::builder()
            .attribute_source(source())
            .manager_lookup(lookup)
            .build()
            .unwrap();

        interceptor
            .invoke_within_transaction(&method("report"), None, || Ok(()))
            .unwrap();
        assert_eq!(reporting.commit_count(), 1);
        assert_eq!(interceptor.cached_manager_count(), 1);

        interceptor.clear_manager_cache();
        assert_eq!(interceptor.cached_manager_count(), 0);
    }

    #[test]
    fn test_default_manager_name_beats_static_manager() {
        let named = Arc::new(RecordingTransactionManager::new());
        let fallback = Arc::new(RecordingTransactionManager::new());
        let interceptor = TransactionInterceptor::builder()
            .attribute_source(source())
            .manager(TransactionManager::Platform(fallback.clone()))
            .manager_lookup(Arc::new(
                StaticManagerLookup::new().with_manager("primaryTm", TransactionManager::Platform(named.clone())),
            ))
            .default_manager_name("primaryTm")
            .build()
            .unwrap();

        interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || Ok(()))
            .unwrap();

        assert_eq!(named.commit_count(), 1);
        assert!(fallback.calls().is_empty());
    }

    #[test]
    fn test_reactive_manager_rejects_blocking_invocation() {
        let interceptor = TransactionInterceptor::builder()
            .attribute_source(source())
            .manager(TransactionManager::reactive(RecordingReactiveManager::new()))
            .build()
            .unwrap();

        let error = interceptor
            .invoke_within_transaction(&method("placeOrder"), None, || Ok(()))
            .unwrap_err();

        assert!(matches!(
            error.as_transaction(),
            Some(TransactionError::UnsupportedInvocationShape { .. })
        ));
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            TransactionInterceptor::builder().build(),
            Err(TransactionError::Configuration(_))
        ));
        assert!(matches!(
            TransactionInterceptor::builder().attribute_source(source()).build(),
            Err(TransactionError::Configuration(_))
        ));
        assert!(matches!(
            TransactionInterceptor::builder()
                .attribute_source(source())
                .default_manager_name("tm")
                .build(),
            Err(TransactionError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_supplies_default_timeout() {
        let manager = Arc::new(RecordingTransactionManager::new());
        let config = TransactionConfig {
            default_manager_name: None,
            default_timeout_seconds: Some(30),
        };
        let interceptor = TransactionInterceptor::builder()
            .attribute_source(source())
            .manager(TransactionManager::Platform(manager.clone()))
            .with_config(&config)
            .build()
            .unwrap();

        let attribute = interceptor
            .resolve_attribute(&method("placeOrder"), None, "app.OrderService.placeOrder")
            .unwrap();
        assert_eq!(attribute.timeout, Some(Duration::from_secs(30)));
    }
}
