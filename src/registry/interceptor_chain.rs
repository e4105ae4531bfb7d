//! # Interceptor Chain
//!
//! Copy-on-write list of installed lifecycle interceptors. Writers publish a
//! whole new vector; readers take a snapshot and never observe a partially
//! updated chain.

use crate::lifecycle::{same_interceptor, LifecycleInterceptor};
use arc_swap::ArcSwap;
use std::sync::Arc;

pub struct InterceptorChain {
    chain: ArcSwap<Vec<Arc<dyn LifecycleInterceptor>>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self {
            chain: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Remove any equal interceptor, then append
    pub fn install(&self, interceptor: Arc<dyn LifecycleInterceptor>) {
        self.bulk_install(vec![interceptor]);
    }

    /// Install several interceptors in order as one published update
    pub fn bulk_install(&self, interceptors: Vec<Arc<dyn LifecycleInterceptor>>) {
        if interceptors.is_empty() {
            return;
        }
        self.chain.rcu(|current| {
            let mut next: Vec<Arc<dyn LifecycleInterceptor>> = Vec::clone(current);
            for interceptor in &interceptors {
                next.retain(|existing| !same_interceptor(existing, interceptor));
                next.push(Arc::clone(interceptor));
            }
            next
        });
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn LifecycleInterceptor>>> {
        self.chain.load_full()
    }

    pub fn len(&self) -> usize {
        self.chain.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.chain
            .load()
            .iter()
            .map(|interceptor| interceptor.name().to_string())
            .collect()
    }
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}
