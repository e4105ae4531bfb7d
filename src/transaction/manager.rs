//! # Transaction Managers
//!
//! The three manager shapes the interceptor drives. Which shape a manager
//! has is fixed when it is wrapped in [`TransactionManager`]; the
//! interceptor never probes for capabilities at invocation time.

use crate::error::{ApplicationError, TransactionResult};
use crate::transaction::attribute::TransactionAttribute;
use crate::transaction::status::TransactionStatus;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Blocking manager driven by the caller: begin, then commit or roll back
pub trait PlatformTransactionManager: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn get_transaction(&self, attribute: &TransactionAttribute) -> TransactionResult<Arc<TransactionStatus>>;

    fn commit(&self, status: &Arc<TransactionStatus>) -> TransactionResult<()>;

    fn rollback(&self, status: &Arc<TransactionStatus>) -> TransactionResult<()>;
}

/// Work handed to a [`CallbackPreferringTransactionManager`]. Returning an
/// error asks the manager to roll back.
pub type TransactionCallback<'a> =
    Box<dyn FnOnce(&Arc<TransactionStatus>) -> Result<(), ApplicationError> + 'a>;

/// Blocking manager that drives the callback itself
pub trait CallbackPreferringTransactionManager: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Run `callback` inside a transaction. `Ok(Some(error))` reports that
    /// the callback failed and the transaction was rolled back; `Ok(None)`
    /// reports a commit.
    fn execute(
        &self,
        attribute: &TransactionAttribute,
        callback: TransactionCallback<'_>,
    ) -> TransactionResult<Option<ApplicationError>>;
}

/// Asynchronous manager for invocations that may suspend
#[async_trait]
pub trait ReactiveTransactionManager: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn begin(&self, attribute: &TransactionAttribute) -> TransactionResult<Arc<TransactionStatus>>;

    async fn commit(&self, status: Arc<TransactionStatus>) -> TransactionResult<()>;

    async fn rollback(&self, status: Arc<TransactionStatus>) -> TransactionResult<()>;
}

/// A manager together with the invocation shape it supports
#[derive(Clone)]
pub enum TransactionManager {
    Platform(Arc<dyn PlatformTransactionManager>),
    CallbackPreferring(Arc<dyn CallbackPreferringTransactionManager>),
    Reactive(Arc<dyn ReactiveTransactionManager>),
}

impl TransactionManager {
    pub fn platform<M: PlatformTransactionManager + 'static>(manager: M) -> Self {
        Self::Platform(Arc::new(manager))
    }

    pub fn callback_preferring<M: CallbackPreferringTransactionManager + 'static>(manager: M) -> Self {
        Self::CallbackPreferring(Arc::new(manager))
    }

    pub fn reactive<M: ReactiveTransactionManager + 'static>(manager: M) -> Self {
        Self::Reactive(Arc::new(manager))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Platform(manager) => manager.name(),
            Self::CallbackPreferring(manager) => manager.name(),
            Self::Reactive(manager) => manager.name(),
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Self::Platform(_) => "platform",
            Self::CallbackPreferring(_) => "callback-preferring",
            Self::Reactive(_) => "reactive",
        }
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Self::Reactive(_))
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionManager::{}({})", self.shape(), self.name())
    }
}
