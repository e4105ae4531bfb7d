// Recording transaction managers for each invocation shape.
//
// The blocking manager models propagation well enough for nesting tests:
// `RequiresNew` always starts a transaction, `Required` joins the innermost
// active one, and a participating rollback marks the outer transaction
// rollback-only.

use crate::error::{ApplicationError, TransactionError, TransactionResult};
use crate::transaction::{
    CallbackPreferringTransactionManager, PlatformTransactionManager, Propagation,
    ReactiveTransactionManager, TransactionAttribute, TransactionCallback, TransactionStatus,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCall {
    Begin(String),
    /// Participation in an already active transaction
    Join(String),
    Commit(String),
    Rollback(String),
    SetRollbackOnly(String),
}

#[derive(Debug, Default)]
struct CallLog {
    calls: Mutex<Vec<ManagerCall>>,
}

impl CallLog {
    fn push(&self, call: ManagerCall) {
        self.calls.lock().push(call);
    }

    fn snapshot(&self) -> Vec<ManagerCall> {
        self.calls.lock().clone()
    }

    fn count(&self, matches: impl Fn(&ManagerCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }
}

fn transaction_name(attribute: &TransactionAttribute) -> String {
    attribute.display_name().to_string()
}

/// Blocking manager driven by the interceptor
#[derive(Debug, Default)]
pub struct RecordingTransactionManager {
    log: CallLog,
    active: Mutex<Vec<Arc<TransactionStatus>>>,
    fail_commit: bool,
    fail_rollback: bool,
}

impl RecordingTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every commit fails after being recorded
    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    /// Every rollback fails after being recorded
    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn calls(&self) -> Vec<ManagerCall> {
        self.log.snapshot()
    }

    pub fn begin_count(&self) -> usize {
        self.log.count(|call| matches!(call, ManagerCall::Begin(_)))
    }

    pub fn commit_count(&self) -> usize {
        self.log.count(|call| matches!(call, ManagerCall::Commit(_)))
    }

    pub fn rollback_count(&self) -> usize {
        self.log.count(|call| matches!(call, ManagerCall::Rollback(_)))
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    fn finish(&self, status: &Arc<TransactionStatus>) -> TransactionResult<()> {
        if !status.mark_completed() {
            return Err(TransactionError::system(format!(
                "transaction '{}' is already completed",
                status.name()
            )));
        }
        if status.is_new_transaction() {
            self.active.lock().retain(|active| active.id() != status.id());
        }
        Ok(())
    }
}

impl PlatformTransactionManager for RecordingTransactionManager {
    fn name(&self) -> &str {
        "recording"
    }

    fn get_transaction(&self, attribute: &TransactionAttribute) -> TransactionResult<Arc<TransactionStatus>> {
        let name = transaction_name(attribute);
        let current = self.active.lock().last().cloned();

        match (attribute.propagation, current) {
            (Propagation::Never, Some(current)) => Err(TransactionError::system(format!(
                "'{name}' must not run inside transaction '{}'",
                current.name()
            ))),
            (Propagation::Mandatory, None) => Err(TransactionError::system(format!(
                "'{name}' requires an existing transaction"
            ))),
            (Propagation::Required | Propagation::Supports | Propagation::Mandatory, Some(current)) => {
                self.log.push(ManagerCall::Join(current.name().to_string()));
                Ok(Arc::new(TransactionStatus::new(current.name(), false, attribute.read_only)))
            }
            (Propagation::Supports | Propagation::NotSupported | Propagation::Never, _) => {
                Ok(Arc::new(TransactionStatus::new(name, false, attribute.read_only)))
            }
            _ => {
                self.log.push(ManagerCall::Begin(name.clone()));
                let status = Arc::new(TransactionStatus::new(name, true, attribute.read_only));
                self.active.lock().push(Arc::clone(&status));
                Ok(status)
            }
        }
    }

    fn commit(&self, status: &Arc<TransactionStatus>) -> TransactionResult<()> {
        self.finish(status)?;
        if !status.is_new_transaction() {
            return Ok(());
        }
        if status.is_rollback_only() {
            self.log.push(ManagerCall::Rollback(status.name().to_string()));
            return Ok(());
        }
        self.log.push(ManagerCall::Commit(status.name().to_string()));
        if self.fail_commit {
            return Err(TransactionError::commit_failure(status.name(), "injected commit failure"));
        }
        Ok(())
    }

    fn rollback(&self, status: &Arc<TransactionStatus>) -> TransactionResult<()> {
        self.finish(status)?;
        if !status.is_new_transaction() {
            if let Some(outer) = self
                .active
                .lock()
                .iter()
                .rev()
                .find(|active| active.name() == status.name())
            {
                outer.set_rollback_only();
                self.log.push(ManagerCall::SetRollbackOnly(status.name().to_string()));
            }
            return Ok(());
        }
        self.log.push(ManagerCall::Rollback(status.name().to_string()));
        if self.fail_rollback {
            return Err(TransactionError::rollback_failure(status.name(), "injected rollback failure"));
        }
        Ok(())
    }
}

/// Manager that drives the callback itself
#[derive(Debug, Default)]
pub struct CallbackTransactionManager {
    log: CallLog,
}

impl CallbackTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ManagerCall> {
        self.log.snapshot()
    }

    pub fn commit_count(&self) -> usize {
        self.log.count(|call| matches!(call, ManagerCall::Commit(_)))
    }

    pub fn rollback_count(&self) -> usize {
        self.log.count(|call| matches!(call, ManagerCall::Rollback(_)))
    }
}

impl CallbackPreferringTransactionManager for CallbackTransactionManager {
    fn name(&self) -> &str {
        "recording-callback"
    }

    fn execute(
        &self,
        attribute: &TransactionAttribute,
        callback: TransactionCallback<'_>,
    ) -> TransactionResult<Option<ApplicationError>> {
        let name = transaction_name(attribute);
        let status = Arc::new(TransactionStatus::new(name.clone(), true, attribute.read_only));
        self.log.push(ManagerCall::Begin(name.clone()));

        let outcome = callback(&status);
        status.mark_completed();
        match outcome {
            Ok(()) if status.is_rollback_only() => {
                self.log.push(ManagerCall::Rollback(name));
                Ok(None)
            }
            Ok(()) => {
                self.log.push(ManagerCall::Commit(name));
                Ok(None)
            }
            Err(error) => {
                self.log.push(ManagerCall::Rollback(name));
                Ok(Some(error))
            }
        }
    }
}

/// Asynchronous manager; completion can be slowed down to widen
/// cancellation windows
#[derive(Debug, Default)]
pub struct RecordingReactiveManager {
    log: CallLog,
    completion_delay: Option<Duration>,
}

impl RecordingReactiveManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ManagerCall> {
        self.log.snapshot()
    }

    pub fn commit_count(&self) -> usize {
        self.log.count(|call| matches!(call, ManagerCall::Commit(_)))
    }

    pub fn rollback_count(&self) -> usize {
        self.log.count(|call| matches!(call, ManagerCall::Rollback(_)))
    }

    async fn delay(&self) {
        if let Some(delay) = self.completion_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ReactiveTransactionManager for RecordingReactiveManager {
    fn name(&self) -> &str {
        "recording-reactive"
    }

    async fn begin(&self, attribute: &TransactionAttribute) -> TransactionResult<Arc<TransactionStatus>> {
        let name = transaction_name(attribute);
        self.log.push(ManagerCall::Begin(name.clone()));
        Ok(Arc::new(TransactionStatus::new(name, true, attribute.read_only)))
    }

    async fn commit(&self, status: Arc<TransactionStatus>) -> TransactionResult<()> {
        self.delay().await;
        status.mark_completed();
        if status.is_rollback_only() {
            self.log.push(ManagerCall::Rollback(status.name().to_string()));
        } else {
            self.log.push(ManagerCall::Commit(status.name().to_string()));
        }
        Ok(())
    }

    async fn rollback(&self, status: Arc<TransactionStatus>) -> TransactionResult<()> {
        self.delay().await;
        status.mark_completed();
        self.log.push(ManagerCall::Rollback(status.name().to_string()));
        Ok(())
    }
}
