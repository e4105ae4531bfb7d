//! # Reactive Transactions
//!
//! Transaction demarcation for invocations that may suspend. State travels
//! in a tokio task-local rather than the thread-local stack, since the
//! invocation can resume on another worker thread.
//!
//! Sequencing per invocation: begin, then the invocation's terminal signal
//! (value, error or cancellation), then exactly one of commit or rollback.
//! Cancellation, whether signalled through a [`CancellationToken`] or by
//! dropping the future after begin, always resolves to rollback. A future
//! dropped while its commit or rollback is pending has that completion
//! driven to the end on the runtime.
//!
//! ```rust
//! use stratum_core::test_helpers::RecordingReactiveManager;
//! use stratum_core::transaction::{
//!     current_reactive_status, MethodId, NameMatchAttributeSource, TransactionAttribute,
//!     TransactionInterceptor, TransactionManager,
//! };
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let interceptor = TransactionInterceptor::builder()
//!     .attribute_source(Arc::new(
//!         NameMatchAttributeSource::new().with_method("save*", TransactionAttribute::new()),
//!     ))
//!     .manager(TransactionManager::reactive(RecordingReactiveManager::new()))
//!     .build()
//!     .unwrap();
//!
//! let method = MethodId::new("app.AccountRepository", "saveAccount");
//! let name = interceptor
//!     .invoke_within_transaction_async(&method, None, async {
//!         Ok(current_reactive_status().map(|status| status.name().to_string()).ok())
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(name.as_deref(), Some("app.AccountRepository.saveAccount"));
//! # });
//! ```

use crate::error::{ApplicationError, InvocationError, TransactionError, TransactionResult};
use crate::logging::log_transaction_operation;
use crate::transaction::attribute::TransactionAttribute;
use crate::transaction::attribute_source::MethodId;
use crate::transaction::info::TransactionInfo;
use crate::transaction::interceptor::{supersede, TransactionInterceptor};
use crate::transaction::manager::{ReactiveTransactionManager, TransactionManager};
use crate::transaction::status::TransactionStatus;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

tokio::task_local! {
    static REACTIVE_TRANSACTION: Arc<TransactionInfo>;
}

/// Innermost record of the current asynchronous invocation chain
pub fn current_reactive_transaction() -> Option<Arc<TransactionInfo>> {
    REACTIVE_TRANSACTION.try_with(Arc::clone).ok()
}

/// Status of the innermost asynchronous invocation, if it is transactional
pub fn current_reactive_status() -> TransactionResult<Arc<TransactionStatus>> {
    current_reactive_transaction()
        .and_then(|info| info.status().cloned())
        .ok_or(TransactionError::NoTransaction)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Commit,
    Rollback,
}

impl Completion {
    fn operation(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        }
    }

    async fn run(self, manager: &dyn ReactiveTransactionManager, status: Arc<TransactionStatus>) -> TransactionResult<()> {
        match self {
            Self::Commit => manager.commit(status).await,
            Self::Rollback => manager.rollback(status).await,
        }
    }
}

/// Completion still owed to a begun transaction. Dropped while armed, it
/// spawns that completion on the current runtime.
struct CompletionGuard {
    manager: Arc<dyn ReactiveTransactionManager>,
    pending: Option<(Completion, Arc<TransactionStatus>)>,
    joinpoint: String,
}

impl CompletionGuard {
    fn arm(&mut self, completion: Completion, status: &Arc<TransactionStatus>) {
        self.pending = Some((completion, Arc::clone(status)));
    }

    fn disarm(&mut self) {
        self.pending = None;
    }

    /// Run `completion`, staying armed until it resolves
    async fn complete(&mut self, completion: Completion, status: Arc<TransactionStatus>) -> TransactionResult<()> {
        self.arm(completion, &status);
        let result = completion.run(self.manager.as_ref(), status).await;
        self.disarm();
        result
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let Some((completion, status)) = self.pending.take() else {
            return;
        };
        warn!(
            joinpoint = %self.joinpoint,
            completion = completion.operation(),
            "Invocation dropped before its transaction completed"
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = Arc::clone(&self.manager);
                let joinpoint = self.joinpoint.clone();
                handle.spawn(async move {
                    if let Err(e) = completion.run(manager.as_ref(), status).await {
                        error!(
                            joinpoint = %joinpoint,
                            completion = completion.operation(),
                            error = %e,
                            "Completion of dropped invocation failed"
                        );
                    }
                });
            }
            Err(_) => {
                error!(
                    joinpoint = %self.joinpoint,
                    transaction = %status.name(),
                    completion = completion.operation(),
                    "No tokio runtime available to complete dropped invocation"
                );
            }
        }
    }
}

impl TransactionInterceptor {
    /// Run an asynchronous invocation within the transaction its attribute
    /// describes
    pub async fn invoke_within_transaction_async<T, Fut>(
        &self,
        method: &MethodId,
        target_type: Option<&str>,
        invocation: Fut,
    ) -> Result<T, InvocationError>
    where
        Fut: Future<Output = Result<T, ApplicationError>>,
    {
        self.invoke_within_transaction_cancellable(method, target_type, invocation, CancellationToken::new())
            .await
    }

    /// As [`invoke_within_transaction_async`](Self::invoke_within_transaction_async),
    /// rolling back with [`TransactionError::Cancelled`] if `cancellation`
    /// fires before the invocation completes
    pub async fn invoke_within_transaction_cancellable<T, Fut>(
        &self,
        method: &MethodId,
        target_type: Option<&str>,
        invocation: Fut,
        cancellation: CancellationToken,
    ) -> Result<T, InvocationError>
    where
        Fut: Future<Output = Result<T, ApplicationError>>,
    {
        let joinpoint = method.qualified_name(target_type);
        let previous = current_reactive_transaction();

        let Some(attribute) = self.resolve_attribute(method, target_type, &joinpoint) else {
            let info = Arc::new(TransactionInfo::non_transactional(&joinpoint).linked_to(previous));
            return REACTIVE_TRANSACTION
                .scope(info, invocation)
                .await
                .map_err(InvocationError::from);
        };

        let manager = match self.determine_manager(&attribute)? {
            TransactionManager::Reactive(manager) => manager,
            other => {
                return Err(TransactionError::UnsupportedInvocationShape {
                    reason: format!(
                        "asynchronous invocation requires a reactive transaction manager, '{}' is {}",
                        other.name(),
                        other.shape()
                    ),
                    joinpoint,
                }
                .into())
            }
        };

        let status = manager.begin(&attribute).await?;
        log_transaction_operation("begin", &joinpoint, Some(status.name()), "started", Some("reactive"));

        let mut guard = CompletionGuard {
            manager: Arc::clone(&manager),
            pending: Some((Completion::Rollback, Arc::clone(&status))),
            joinpoint: joinpoint.clone(),
        };
        let info = Arc::new(
            TransactionInfo::new(
                Some(TransactionManager::Reactive(Arc::clone(&manager))),
                Some(attribute.clone()),
                &joinpoint,
                Some(Arc::clone(&status)),
            )
            .linked_to(previous),
        );

        let outcome = tokio::select! {
            biased;
            _ = cancellation.cancelled() => None,
            result = REACTIVE_TRANSACTION.scope(info, invocation) => Some(result),
        };

        match outcome {
            None => {
                log_transaction_operation("rollback", &joinpoint, Some(status.name()), "cancelled", Some("reactive"));
                guard.complete(Completion::Rollback, status).await?;
                Err(TransactionError::Cancelled { joinpoint }.into())
            }
            Some(Ok(value)) => {
                log_transaction_operation("commit", &joinpoint, Some(status.name()), "committing", Some("reactive"));
                guard.complete(Completion::Commit, status).await?;
                Ok(value)
            }
            Some(Err(application_error)) => {
                Err(complete_after_failure(&mut guard, status, &attribute, &joinpoint, application_error).await)
            }
        }
    }
}

async fn complete_after_failure(
    guard: &mut CompletionGuard,
    status: Arc<TransactionStatus>,
    attribute: &TransactionAttribute,
    joinpoint: &str,
    application_error: ApplicationError,
) -> InvocationError {
    let name = status.name().to_string();
    let completion = if attribute.rollback_on(&application_error) {
        log_transaction_operation("rollback", joinpoint, Some(&name), "rolling_back", Some(application_error.label()));
        Completion::Rollback
    } else {
        log_transaction_operation(
            "commit",
            joinpoint,
            Some(&name),
            "committing_despite_failure",
            Some(application_error.label()),
        );
        Completion::Commit
    };
    match guard.complete(completion, status).await {
        Ok(()) => application_error.into(),
        Err(failure) => supersede(failure, application_error, joinpoint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ManagerCall, RecordingReactiveManager, RecordingTransactionManager};
    use crate::transaction::attribute_source::{AttributeSource, NameMatchAttributeSource};
    use std::time::Duration;

    fn interceptor(manager: &Arc<RecordingReactiveManager>) -> TransactionInterceptor {
        let source: Arc<dyn AttributeSource> =
            Arc::new(NameMatchAttributeSource::new().with_method("save*", TransactionAttribute::new()));
        TransactionInterceptor::builder()
            .attribute_source(source)
            .manager(TransactionManager::Reactive(manager.clone()))
            .build()
            .unwrap()
    }

    fn method(name: &str) -> MethodId {
        MethodId::new("app.AccountRepository", name)
    }

    #[tokio::test]
    async fn test_commit_on_completion() {
        let manager = Arc::new(RecordingReactiveManager::new());
        let interceptor = interceptor(&manager);

        let value = interceptor
            .invoke_within_transaction_async(&method("saveAccount"), None, async {
                tokio::task::yield_now().await;
                let status = current_reactive_status().unwrap();
                assert_eq!(status.name(), "app.AccountRepository.saveAccount");
                Ok(7)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(manager.commit_count(), 1);
        assert_eq!(manager.rollback_count(), 0);
        assert!(current_reactive_transaction().is_none());
    }

    #[tokio::test]
    async fn test_error_follows_rollback_predicate() {
        let manager = Arc::new(RecordingReactiveManager::new());
        let interceptor = interceptor(&manager);

        let runtime = interceptor
            .invoke_within_transaction_async(&method("saveAccount"), None, async {
                Err::<(), _>(ApplicationError::runtime("IllegalState", "boom"))
            })
            .await
            .unwrap_err();
        assert_eq!(runtime.as_application().unwrap().label(), "IllegalState");

        let checked = interceptor
            .invoke_within_transaction_async(&method("saveAccount"), None, async {
                Err::<(), _>(ApplicationError::checked("IoFailure", "disk"))
            })
            .await
            .unwrap_err();
        assert_eq!(checked.as_application().unwrap().label(), "IoFailure");

        assert_eq!(manager.rollback_count(), 1);
        assert_eq!(manager.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_token_cancellation_rolls_back_once() {
        let manager = Arc::new(RecordingReactiveManager::new());
        let interceptor = interceptor(&manager);
        let token = CancellationToken::new();
        let trigger = token.clone();

        let error = interceptor
            .invoke_within_transaction_cancellable(
                &method("saveAccount"),
                None,
                async move {
                    trigger.cancel();
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                },
                token,
            )
            .await
            .unwrap_err();

        assert!(matches!(error.as_transaction(), Some(TransactionError::Cancelled { .. })));
        assert_eq!(manager.rollback_count(), 1);
        assert_eq!(manager.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_nested_reactive_records_stack() {
        let manager = Arc::new(RecordingReactiveManager::new());
        let interceptor = interceptor(&manager);

        interceptor
            .invoke_within_transaction_async(&method("saveOuter"), None, async {
                let outer = current_reactive_status().unwrap().name().to_string();
                interceptor
                    .invoke_within_transaction_async(&method("loadInner"), None, async {
                        let info = current_reactive_transaction().unwrap();
                        assert!(!info.has_transaction());
                        assert_eq!(info.previous().unwrap().joinpoint(), "app.AccountRepository.saveOuter");
                        Ok(())
                    })
                    .await
                    .map_err(|e| ApplicationError::runtime("Nested", e))?;
                assert_eq!(current_reactive_status().unwrap().name(), outer);
                Ok::<(), ApplicationError>(())
            })
            .await
            .unwrap();

        assert_eq!(
            manager.calls(),
            vec![
                ManagerCall::Begin("app.AccountRepository.saveOuter".to_string()),
                ManagerCall::Commit("app.AccountRepository.saveOuter".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_blocking_manager_rejects_async_invocation() {
        let source: Arc<dyn AttributeSource> =
            Arc::new(NameMatchAttributeSource::new().with_method("save*", TransactionAttribute::new()));
        let interceptor = TransactionInterceptor::builder()
            .attribute_source(source)
            .manager(TransactionManager::platform(RecordingTransactionManager::new()))
            .build()
            .unwrap();

        let error = interceptor
            .invoke_within_transaction_async(&method("saveAccount"), None, async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(
            error.as_transaction(),
            Some(TransactionError::UnsupportedInvocationShape { .. })
        ));
    }
}
