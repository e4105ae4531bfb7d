//! Per-instance lifecycle hooks run by the registry around component creation.

use crate::error::ContainerResult;
use crate::registry::{Component, Descriptor, Role};
use std::sync::Arc;

/// Facts about the instance currently being created
#[derive(Debug, Clone)]
pub struct CreationContext {
    pub name: String,
    pub type_name: String,
    pub role: Role,
    /// Size of the interceptor chain applied to this instance
    pub installed_interceptors: usize,
}

/// Hooks invoked for every component the registry creates.
///
/// Each hook may return a replacement instance (a wrapper, for example);
/// the next interceptor in the chain sees the replacement.
pub trait LifecycleInterceptor: Send + Sync {
    fn name(&self) -> &str;

    fn before_initialization(
        &self,
        instance: Arc<dyn Component>,
        _context: &CreationContext,
    ) -> ContainerResult<Arc<dyn Component>> {
        Ok(instance)
    }

    fn after_initialization(
        &self,
        instance: Arc<dyn Component>,
        _context: &CreationContext,
    ) -> ContainerResult<Arc<dyn Component>> {
        Ok(instance)
    }

    /// Interceptors that inspect the merged descriptor right after
    /// instantiation. Registration moves them to the end of the chain.
    fn is_merged_definition_aware(&self) -> bool {
        false
    }

    fn on_merged_descriptor(&self, _name: &str, _descriptor: &Descriptor) -> ContainerResult<()> {
        Ok(())
    }

    /// Interceptors returning the same key are considered equal, so
    /// installing one replaces the other. `None` means identity equality.
    fn dedup_key(&self) -> Option<&str> {
        None
    }
}

/// Equality used by the installed chain: same dedup key, or the same allocation
pub fn same_interceptor(
    left: &Arc<dyn LifecycleInterceptor>,
    right: &Arc<dyn LifecycleInterceptor>,
) -> bool {
    match (left.dedup_key(), right.dedup_key()) {
        (Some(a), Some(b)) => a == b,
        _ => std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right)),
    }
}
