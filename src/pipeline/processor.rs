//! Processor roles driven by the registry pipeline.

use crate::error::ContainerResult;
use crate::registry::DefinitionRegistry;
use std::sync::Arc;

/// Observes or adjusts the finalized registry. Must not register descriptors.
pub trait FactoryFinalizer: Send + Sync {
    fn processor_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn finalize_factory(&self, registry: &dyn DefinitionRegistry) -> ContainerResult<()>;
}

/// May register or alter descriptors before regular instantiation. Every
/// mutator is also a finalizer and receives its finalizer hook after all
/// mutation has reached a fixpoint.
pub trait RegistryMutator: FactoryFinalizer {
    fn mutate_registry(&self, registry: &dyn DefinitionRegistry) -> ContainerResult<()>;
}

/// Processor handed to the pipeline directly rather than discovered in the registry
#[derive(Clone)]
pub enum SuppliedProcessor {
    Mutator(Arc<dyn RegistryMutator>),
    Finalizer(Arc<dyn FactoryFinalizer>),
}

impl SuppliedProcessor {
    pub fn name(&self) -> &str {
        match self {
            Self::Mutator(mutator) => mutator.processor_name(),
            Self::Finalizer(finalizer) => finalizer.processor_name(),
        }
    }
}

impl std::fmt::Debug for SuppliedProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mutator(_) => write!(f, "SuppliedProcessor::Mutator({})", self.name()),
            Self::Finalizer(_) => write!(f, "SuppliedProcessor::Finalizer({})", self.name()),
        }
    }
}

struct MutatorFinalizer(Arc<dyn RegistryMutator>);

impl FactoryFinalizer for MutatorFinalizer {
    fn processor_name(&self) -> &str {
        self.0.processor_name()
    }

    fn finalize_factory(&self, registry: &dyn DefinitionRegistry) -> ContainerResult<()> {
        self.0.finalize_factory(registry)
    }
}

/// View a registry mutator through its finalizer hook
pub fn finalizer_view(mutator: Arc<dyn RegistryMutator>) -> Arc<dyn FactoryFinalizer> {
    Arc::new(MutatorFinalizer(mutator))
}
