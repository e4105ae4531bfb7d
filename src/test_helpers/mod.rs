// Test Helpers Module - Recording Collaborators
//
// Provides recording processors, interceptors, listeners and transaction
// managers shared by unit tests, integration tests and doc examples. Every
// recorder appends to a `Journal` so tests can assert on hook order.

pub mod components;
pub mod journal;
pub mod transaction_managers;

pub use components::{
    RecordingFinalizer, RecordingInterceptor, RecordingListener, RecordingMutator, SpawningMutator,
};
pub use journal::Journal;
pub use transaction_managers::{
    CallbackTransactionManager, ManagerCall, RecordingReactiveManager, RecordingTransactionManager,
};
