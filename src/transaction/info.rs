//! # Transaction Info Stack
//!
//! Every intercepted invocation, transactional or not, pushes a
//! [`TransactionInfo`] onto a per-thread stack for the blocking path and
//! pops it when the invocation completes. The stack is a linked list
//! through [`TransactionInfo::previous`]; the thread only holds its top.

use crate::error::{TransactionError, TransactionResult};
use crate::transaction::attribute::TransactionAttribute;
use crate::transaction::manager::TransactionManager;
use crate::transaction::status::TransactionStatus;
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<Arc<TransactionInfo>>> = const { RefCell::new(None) };
}

/// Per-invocation record of the transaction in effect
#[derive(Debug)]
pub struct TransactionInfo {
    manager: Option<TransactionManager>,
    attribute: Option<TransactionAttribute>,
    joinpoint: String,
    status: Option<Arc<TransactionStatus>>,
    previous: Option<Arc<TransactionInfo>>,
}

impl TransactionInfo {
    pub fn new(
        manager: Option<TransactionManager>,
        attribute: Option<TransactionAttribute>,
        joinpoint: impl Into<String>,
        status: Option<Arc<TransactionStatus>>,
    ) -> Self {
        Self {
            manager,
            attribute,
            joinpoint: joinpoint.into(),
            status,
            previous: None,
        }
    }

    pub(crate) fn non_transactional(joinpoint: impl Into<String>) -> Self {
        Self::new(None, None, joinpoint, None)
    }

    pub(crate) fn linked_to(mut self, previous: Option<Arc<TransactionInfo>>) -> Self {
        self.previous = previous;
        self
    }

    pub fn manager(&self) -> Option<&TransactionManager> {
        self.manager.as_ref()
    }

    pub fn attribute(&self) -> Option<&TransactionAttribute> {
        self.attribute.as_ref()
    }

    pub fn joinpoint(&self) -> &str {
        &self.joinpoint
    }

    pub fn status(&self) -> Option<&Arc<TransactionStatus>> {
        self.status.as_ref()
    }

    /// Whether a transaction was actually begun for this invocation
    pub fn has_transaction(&self) -> bool {
        self.status.is_some()
    }

    /// Record of the enclosing invocation on the same execution context
    pub fn previous(&self) -> Option<&Arc<TransactionInfo>> {
        self.previous.as_ref()
    }

    /// Number of records on the stack, this one included
    pub fn depth(&self) -> usize {
        1 + self.previous.as_ref().map_or(0, |previous| previous.depth())
    }
}

/// Restores the thread's previous record when dropped
#[must_use = "the record is unbound as soon as the binding is dropped"]
pub(crate) struct ThreadBinding {
    info: Arc<TransactionInfo>,
}

impl Drop for ThreadBinding {
    fn drop(&mut self) {
        let previous = self.info.previous.clone();
        // Thread-local may already be torn down during thread exit
        let _ = CURRENT.try_with(|current| *current.borrow_mut() = previous);
    }
}

/// Push `info` onto this thread's stack
pub(crate) fn bind_to_thread(info: TransactionInfo) -> ThreadBinding {
    let info = CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        let info = Arc::new(info.linked_to(current.take()));
        *current = Some(Arc::clone(&info));
        info
    });
    ThreadBinding { info }
}

/// Innermost record on this thread, if any invocation is in progress
pub fn current_transaction_info() -> Option<Arc<TransactionInfo>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Status of the innermost invocation on this thread.
///
/// Fails with [`TransactionError::NoTransaction`] when no invocation is in
/// progress or the innermost one is not transactional.
pub fn current_transaction_status() -> TransactionResult<Arc<TransactionStatus>> {
    current_transaction_info()
        .and_then(|info| info.status.clone())
        .ok_or(TransactionError::NoTransaction)
}
