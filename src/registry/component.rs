//! # Components
//!
//! Materialized instances are held as `Arc<dyn Component>`. A component
//! exposes the processor or interceptor roles it plays through the `as_*`
//! view methods, each defaulting to "not provided".

use crate::error::ContainerResult;
use crate::events::EventListener;
use crate::lifecycle::LifecycleInterceptor;
use crate::pipeline::{FactoryFinalizer, RegistryMutator};
use std::any::Any;
use std::sync::Arc;

pub trait Component: Any + Send + Sync {
    /// Human readable type name used in logs and advisories
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Initialization callback, run between the before- and after-initialization interceptor hooks
    fn initialize(&self) -> ContainerResult<()> {
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn as_registry_mutator(self: Arc<Self>) -> Option<Arc<dyn RegistryMutator>> {
        None
    }

    fn as_factory_finalizer(self: Arc<Self>) -> Option<Arc<dyn FactoryFinalizer>> {
        None
    }

    fn as_lifecycle_interceptor(self: Arc<Self>) -> Option<Arc<dyn LifecycleInterceptor>> {
        None
    }

    fn as_event_listener(self: Arc<Self>) -> Option<Arc<dyn EventListener>> {
        None
    }
}

/// Recover the concrete type behind a component
pub fn downcast_component<T: Component>(component: Arc<dyn Component>) -> Option<Arc<T>> {
    component.as_any().downcast::<T>().ok()
}

/// Plain value component, for wrapping data that plays no container role
#[derive(Debug)]
pub struct ValueComponent<T> {
    type_name: String,
    value: T,
}

impl<T: Send + Sync + 'static> ValueComponent<T> {
    pub fn new(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Send + Sync + 'static> Component for ValueComponent<T> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
