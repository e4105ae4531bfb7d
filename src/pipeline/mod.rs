//! # Definition-Processor Pipeline
//!
//! Startup phase that lets registry mutators grow the registry to a
//! fixpoint and then runs every factory finalizer, tier by tier.

pub mod processor;
pub mod registry_pipeline;

pub use processor::{finalizer_view, FactoryFinalizer, RegistryMutator, SuppliedProcessor};
pub use registry_pipeline::{
    run_registry_pipeline, PipelinePhase, PipelineReport, PipelineStep, ProcessorOrigin,
};
