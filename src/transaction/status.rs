use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Handle to a transaction begun by a manager, shared between the manager
/// and the code running inside it
#[derive(Debug)]
pub struct TransactionStatus {
    id: Uuid,
    name: String,
    new_transaction: bool,
    read_only: bool,
    rollback_only: AtomicBool,
    completed: AtomicBool,
}

impl TransactionStatus {
    pub fn new(name: impl Into<String>, new_transaction: bool, read_only: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            new_transaction,
            read_only,
            rollback_only: AtomicBool::new(false),
            completed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// False when the status participates in an enclosing transaction
    pub fn is_new_transaction(&self) -> bool {
        self.new_transaction
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Force the eventual outcome to be a rollback
    pub fn set_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::SeqCst);
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }

    /// Mark the transaction completed. Returns false if it already was.
    pub fn mark_completed(&self) -> bool {
        !self.completed.swap(true, Ordering::SeqCst)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_happens_once() {
        let status = TransactionStatus::new("orders", true, false);
        assert!(!status.is_completed());
        assert!(status.mark_completed());
        assert!(!status.mark_completed());
        assert!(status.is_completed());
    }

    #[test]
    fn test_rollback_only_flag() {
        let status = TransactionStatus::new("orders", true, false);
        assert!(!status.is_rollback_only());
        status.set_rollback_only();
        assert!(status.is_rollback_only());
    }
}
