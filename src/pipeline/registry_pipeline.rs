//! # Definition-Processor Pipeline
//!
//! Drives registry mutators and factory finalizers across the three priority
//! tiers. Every tier re-queries the registry instead of iterating a live
//! collection, because a mutator's hook may register further mutators.

use crate::error::{ContainerError, ContainerResult};
use crate::logging::log_pipeline_phase;
use crate::ordering::{order, Prioritized, Priority, PriorityTier};
use crate::pipeline::processor::{FactoryFinalizer, RegistryMutator, SuppliedProcessor};
use crate::registry::{Capability, DefinitionRegistry, RegistryId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

static COMPLETED_REGISTRIES: OnceLock<Mutex<HashSet<RegistryId>>> = OnceLock::new();

/// Where a processor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorOrigin {
    Supplied,
    Discovered(PriorityTier),
    /// Discovered by a remainder iteration (1-based)
    Remainder(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    MutateRegistry,
    FinalizeFactory,
}

/// One hook invocation, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub phase: PipelinePhase,
    pub origin: ProcessorOrigin,
    pub processor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub registry_id: RegistryId,
    pub steps: Vec<PipelineStep>,
    pub remainder_iterations: usize,
    pub registry_phase_processed: Vec<String>,
    pub factory_phase_processed: Vec<String>,
}

impl PipelineReport {
    /// Processor names in invocation order for one phase
    pub fn invoked(&self, phase: PipelinePhase) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| step.phase == phase)
            .map(|step| step.processor.as_str())
            .collect()
    }
}

/// Names processed in one phase. A name enters at most once.
#[derive(Debug)]
struct ProcessedNames {
    phase: &'static str,
    registry_id: RegistryId,
    seen: HashSet<String>,
    in_order: Vec<String>,
}

impl ProcessedNames {
    fn new(phase: &'static str, registry_id: RegistryId) -> Self {
        Self {
            phase,
            registry_id,
            seen: HashSet::new(),
            in_order: Vec::new(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    fn mark(&mut self, name: &str) -> ContainerResult<()> {
        if !self.seen.insert(name.to_string()) {
            return Err(ContainerError::IllegalReentry {
                phase: format!("{} processing of '{name}'", self.phase),
                identity: self.registry_id.to_string(),
            });
        }
        self.in_order.push(name.to_string());
        Ok(())
    }
}

struct PipelineRun<'a> {
    registry: &'a dyn DefinitionRegistry,
    registry_processed: ProcessedNames,
    factory_processed: ProcessedNames,
    applied_mutators: Vec<(String, Arc<dyn RegistryMutator>)>,
    plain_processors: Vec<(String, Arc<dyn FactoryFinalizer>)>,
    steps: Vec<PipelineStep>,
}

impl<'a> PipelineRun<'a> {
    fn new(registry: &'a dyn DefinitionRegistry) -> Self {
        let id = registry.registry_id();
        Self {
            registry,
            registry_processed: ProcessedNames::new("registry-phase", id),
            factory_processed: ProcessedNames::new("factory-phase", id),
            applied_mutators: Vec::new(),
            plain_processors: Vec::new(),
            steps: Vec::new(),
        }
    }

    fn apply_supplied(&mut self, supplied: Vec<SuppliedProcessor>) -> ContainerResult<()> {
        for processor in supplied {
            match processor {
                SuppliedProcessor::Mutator(mutator) => {
                    let name = mutator.processor_name().to_string();
                    self.invoke_mutator(&name, &mutator, ProcessorOrigin::Supplied)?;
                    self.applied_mutators.push((name, mutator));
                }
                SuppliedProcessor::Finalizer(finalizer) => {
                    let name = finalizer.processor_name().to_string();
                    self.plain_processors.push((name, finalizer));
                }
            }
        }
        Ok(())
    }

    /// Fresh snapshot of registry mutators not yet processed
    fn unprocessed_mutators(&self) -> Vec<String> {
        self.registry
            .names_implementing(Capability::RegistryMutator)
            .into_iter()
            .filter(|name| !self.registry_processed.contains(name))
            .collect()
    }

    fn run_mutator_batch(&mut self, names: Vec<String>, origin: ProcessorOrigin) -> ContainerResult<()> {
        let mut batch = Vec::with_capacity(names.len());
        for name in names {
            let priority = self.registry.priority_of(&name)?;
            let mutator = self.registry.materialize_mutator(&name)?;
            self.registry_processed.mark(&name)?;
            batch.push(Prioritized::new(name, priority, mutator));
        }

        for entry in order(batch) {
            self.invoke_mutator(&entry.name, &entry.item, origin)?;
            self.applied_mutators.push((entry.name, entry.item));
        }
        Ok(())
    }

    fn run_mutator_tier(&mut self, tier: PriorityTier) -> ContainerResult<()> {
        let mut names = Vec::new();
        for name in self.unprocessed_mutators() {
            if self.registry.priority_of(&name)?.tier() == tier {
                names.push(name);
            }
        }
        log_pipeline_phase("mutate_registry", &tier.to_string(), names.len(), None);
        self.run_mutator_batch(names, ProcessorOrigin::Discovered(tier))
    }

    fn run_remainder_to_fixpoint(&mut self) -> ContainerResult<usize> {
        let mut iterations = 0;
        loop {
            let names = self.unprocessed_mutators();
            if names.is_empty() {
                break;
            }
            iterations += 1;
            log_pipeline_phase(
                "mutate_registry",
                "remainder",
                names.len(),
                Some(format!("iteration {iterations}").as_str()),
            );
            self.run_mutator_batch(names, ProcessorOrigin::Remainder(iterations))?;
        }
        Ok(iterations)
    }

    fn invoke_mutator(
        &mut self,
        name: &str,
        mutator: &Arc<dyn RegistryMutator>,
        origin: ProcessorOrigin,
    ) -> ContainerResult<()> {
        debug!(processor = %name, origin = ?origin, "Invoking registry mutation hook");
        mutator
            .mutate_registry(self.registry)
            .map_err(|e| e.in_processor(name, "mutate_registry"))?;
        self.steps.push(PipelineStep {
            phase: PipelinePhase::MutateRegistry,
            origin,
            processor: name.to_string(),
        });
        Ok(())
    }

    fn invoke_finalizer(
        &mut self,
        name: &str,
        finalizer: &dyn FactoryFinalizer,
        origin: ProcessorOrigin,
    ) -> ContainerResult<()> {
        debug!(processor = %name, origin = ?origin, "Invoking factory finalizer hook");
        finalizer
            .finalize_factory(self.registry)
            .map_err(|e| e.in_processor(name, "finalize_factory"))?;
        self.steps.push(PipelineStep {
            phase: PipelinePhase::FinalizeFactory,
            origin,
            processor: name.to_string(),
        });
        Ok(())
    }

    /// Finalizer hooks of everything applied so far: mutators first, then
    /// supplied plain finalizers.
    fn finalize_applied(&mut self) -> ContainerResult<()> {
        let applied = std::mem::take(&mut self.applied_mutators);
        for (name, mutator) in &applied {
            let origin = self.origin_of(name);
            debug!(processor = %name, origin = ?origin, "Invoking finalizer hook of applied mutator");
            mutator
                .finalize_factory(self.registry)
                .map_err(|e| e.in_processor(name.as_str(), "finalize_factory"))?;
            self.steps.push(PipelineStep {
                phase: PipelinePhase::FinalizeFactory,
                origin,
                processor: name.clone(),
            });
        }
        self.applied_mutators = applied;

        let plain = std::mem::take(&mut self.plain_processors);
        for (name, finalizer) in &plain {
            self.invoke_finalizer(name, finalizer.as_ref(), ProcessorOrigin::Supplied)?;
        }
        self.plain_processors = plain;
        Ok(())
    }

    fn origin_of(&self, name: &str) -> ProcessorOrigin {
        self.steps
            .iter()
            .find(|step| step.phase == PipelinePhase::MutateRegistry && step.processor == name)
            .map(|step| step.origin)
            .unwrap_or(ProcessorOrigin::Supplied)
    }

    fn run_discovered_finalizers(&mut self) -> ContainerResult<()> {
        let mut highest = Vec::new();
        let mut explicit = Vec::new();
        let mut unordered = Vec::new();

        for name in self.registry.names_implementing(Capability::FactoryFinalizer) {
            if self.registry_processed.contains(&name) {
                continue;
            }
            match self.registry.priority_of(&name)? {
                priority @ Priority::PriorityOrdered(_) => {
                    let finalizer = self.registry.materialize_finalizer(&name)?;
                    highest.push(Prioritized::new(name, priority, finalizer));
                }
                priority @ Priority::Ordered(_) => explicit.push((name, priority)),
                Priority::Unordered => unordered.push(name),
            }
        }

        log_pipeline_phase("finalize_factory", "priority_ordered", highest.len(), None);
        for entry in order(highest) {
            self.factory_processed.mark(&entry.name)?;
            self.invoke_finalizer(
                &entry.name,
                entry.item.as_ref(),
                ProcessorOrigin::Discovered(PriorityTier::Highest),
            )?;
        }

        let mut ordered = Vec::with_capacity(explicit.len());
        for (name, priority) in explicit {
            let finalizer = self.registry.materialize_finalizer(&name)?;
            ordered.push(Prioritized::new(name, priority, finalizer));
        }
        log_pipeline_phase("finalize_factory", "ordered", ordered.len(), None);
        for entry in order(ordered) {
            self.factory_processed.mark(&entry.name)?;
            self.invoke_finalizer(
                &entry.name,
                entry.item.as_ref(),
                ProcessorOrigin::Discovered(PriorityTier::Explicit),
            )?;
        }

        log_pipeline_phase("finalize_factory", "unordered", unordered.len(), None);
        for name in unordered {
            let finalizer = self.registry.materialize_finalizer(&name)?;
            self.factory_processed.mark(&name)?;
            self.invoke_finalizer(
                &name,
                finalizer.as_ref(),
                ProcessorOrigin::Discovered(PriorityTier::Unordered),
            )?;
        }
        Ok(())
    }
}

fn claim_registry(registry_id: RegistryId) -> ContainerResult<()> {
    let completed = COMPLETED_REGISTRIES.get_or_init(|| Mutex::new(HashSet::new()));
    if !completed.lock().insert(registry_id) {
        return Err(ContainerError::IllegalReentry {
            phase: "registry pipeline".to_string(),
            identity: registry_id.to_string(),
        });
    }
    Ok(())
}

/// Run every registry mutator and factory finalizer against `registry`.
///
/// Order of hook invocations:
/// 1. supplied mutators (mutation hook), in the order given;
/// 2. priority-ordered registry mutators;
/// 3. ordered registry mutators, re-queried;
/// 4. all remaining registry mutators, re-queried until none are left;
/// 5. finalizer hooks of every applied mutator, then supplied finalizers;
/// 6. discovered finalizers by tier.
///
/// A registry can go through the pipeline once; a second run fails with
/// [`ContainerError::IllegalReentry`].
pub fn run_registry_pipeline(
    registry: &dyn DefinitionRegistry,
    supplied: Vec<SuppliedProcessor>,
) -> ContainerResult<PipelineReport> {
    let registry_id = registry.registry_id();
    claim_registry(registry_id)?;

    info!(
        registry = %registry_id,
        supplied = supplied.len(),
        descriptors = registry.descriptor_count(),
        "🧩 PIPELINE: Starting registry pipeline"
    );

    let mut run = PipelineRun::new(registry);

    log_pipeline_phase("mutate_registry", "supplied", supplied.len(), None);
    run.apply_supplied(supplied)?;
    run.run_mutator_tier(PriorityTier::Highest)?;
    run.run_mutator_tier(PriorityTier::Explicit)?;
    let remainder_iterations = run.run_remainder_to_fixpoint()?;

    run.finalize_applied()?;
    run.run_discovered_finalizers()?;

    registry.clear_metadata_cache();

    info!(
        registry = %registry_id,
        hooks = run.steps.len(),
        remainder_iterations = remainder_iterations,
        descriptors = registry.descriptor_count(),
        "✅ PIPELINE: Registry pipeline complete"
    );

    Ok(PipelineReport {
        registry_id,
        steps: run.steps,
        remainder_iterations,
        registry_phase_processed: run.registry_processed.in_order,
        factory_phase_processed: run.factory_processed.in_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_names_reject_second_entry() {
        let mut processed = ProcessedNames::new("registry-phase", RegistryId::new());
        processed.mark("a").unwrap();
        let error = processed.mark("a").unwrap_err();
        assert!(error.is_illegal_reentry());
        assert_eq!(processed.in_order, vec!["a"]);
    }

    #[test]
    fn test_claim_registry_once() {
        let id = RegistryId::new();
        claim_registry(id).unwrap();
        assert!(claim_registry(id).unwrap_err().is_illegal_reentry());
    }
}
