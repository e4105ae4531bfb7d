//! # Error Types
//!
//! Layered error taxonomy. Registry and pipeline failures surface as
//! [`ContainerError`] and abort bootstrap. Transaction demarcation failures
//! surface as [`TransactionError`]. Failures raised by intercepted code travel
//! as [`ApplicationError`] and reach the caller unchanged unless a commit or
//! rollback failure supersedes them.

use crate::config::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Registry, pipeline and interceptor registration failures
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("{phase} already ran against registry {identity}")]
    IllegalReentry { phase: String, identity: String },

    #[error("No component descriptor named '{name}'")]
    NotFound { name: String },

    #[error("Component '{name}' does not provide the {expected} capability")]
    TypeMismatch { name: String, expected: String },

    #[error("Component descriptor '{name}' is already registered")]
    DuplicateDefinition { name: String },

    #[error("Component '{name}' is currently in creation: circular reference")]
    CircularReference { name: String },

    #[error("Failed to create component '{name}': {reason}")]
    CreationFailed { name: String, reason: String },

    #[error("Processor '{processor}' failed during {phase}: {source}")]
    ProcessorFailed {
        processor: String,
        phase: String,
        #[source]
        source: Box<ContainerError>,
    },

    #[error("Container configuration error: {0}")]
    Configuration(String),
}

impl ContainerError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn type_mismatch(name: impl Into<String>, expected: impl fmt::Display) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected: expected.to_string(),
        }
    }

    pub fn creation_failed(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::CreationFailed {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Attach the identity of the processor whose hook raised this error
    pub fn in_processor(self, processor: impl Into<String>, phase: impl Into<String>) -> Self {
        Self::ProcessorFailed {
            processor: processor.into(),
            phase: phase.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, unwrapping processor context
    pub fn root_cause(&self) -> &ContainerError {
        match self {
            Self::ProcessorFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_illegal_reentry(&self) -> bool {
        matches!(self.root_cause(), Self::IllegalReentry { .. })
    }
}

pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// Classification of failures raised by intercepted code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unchecked failure; rolls back by default
    Runtime,
    /// Declared, recoverable failure; commits by default
    Checked,
    /// Unrecoverable failure; rolls back by default
    Fatal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime => write!(f, "runtime"),
            Self::Checked => write!(f, "checked"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Failure raised by the code running inside a transactional invocation
#[derive(Debug, Error)]
#[error("{kind} failure '{label}': {cause}")]
pub struct ApplicationError {
    kind: FailureKind,
    label: String,
    cause: anyhow::Error,
}

impl ApplicationError {
    pub fn new(kind: FailureKind, label: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            kind,
            label: label.into(),
            cause: cause.into(),
        }
    }

    pub fn runtime(label: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::new(FailureKind::Runtime, label, anyhow::anyhow!("{message}"))
    }

    pub fn checked(label: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::new(FailureKind::Checked, label, anyhow::anyhow!("{message}"))
    }

    pub fn fatal(label: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::new(FailureKind::Fatal, label, anyhow::anyhow!("{message}"))
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Failure type label matched by rollback rules, e.g. `"InsufficientFunds"`
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

/// Transaction demarcation failures
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("No transaction aspect-managed transaction status in scope")]
    NoTransaction,

    #[error("Commit of transaction '{transaction}' failed: {reason}")]
    CommitFailure {
        transaction: String,
        reason: String,
        application_error: Option<Box<ApplicationError>>,
    },

    #[error("Rollback of transaction '{transaction}' failed: {reason}")]
    RollbackFailure {
        transaction: String,
        reason: String,
        application_error: Option<Box<ApplicationError>>,
    },

    #[error("Transaction system error: {reason}")]
    System {
        reason: String,
        application_error: Option<Box<ApplicationError>>,
    },

    #[error("No transaction manager found for '{qualifier}'")]
    ManagerNotFound { qualifier: String },

    #[error("Transaction manager for '{qualifier}' is ambiguous: {candidates:?}")]
    AmbiguousManager {
        qualifier: String,
        candidates: Vec<String>,
    },

    #[error("Unsupported invocation shape for '{joinpoint}': {reason}")]
    UnsupportedInvocationShape { joinpoint: String, reason: String },

    #[error("Invocation of '{joinpoint}' was cancelled before completion")]
    Cancelled { joinpoint: String },

    #[error("Transaction interceptor misconfigured: {0}")]
    Configuration(String),
}

impl TransactionError {
    pub fn commit_failure(transaction: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::CommitFailure {
            transaction: transaction.into(),
            reason: reason.to_string(),
            application_error: None,
        }
    }

    pub fn rollback_failure(transaction: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::RollbackFailure {
            transaction: transaction.into(),
            reason: reason.to_string(),
            application_error: None,
        }
    }

    pub fn system(reason: impl fmt::Display) -> Self {
        Self::System {
            reason: reason.to_string(),
            application_error: None,
        }
    }

    /// Preserve an in-flight application error as context of a demarcation
    /// failure. Only commit, rollback and system failures carry context; any
    /// other variant is returned unchanged.
    pub fn with_application_error(self, error: ApplicationError) -> Self {
        match self {
            Self::CommitFailure {
                transaction, reason, ..
            } => Self::CommitFailure {
                transaction,
                reason,
                application_error: Some(Box::new(error)),
            },
            Self::RollbackFailure {
                transaction, reason, ..
            } => Self::RollbackFailure {
                transaction,
                reason,
                application_error: Some(Box::new(error)),
            },
            Self::System { reason, .. } => Self::System {
                reason,
                application_error: Some(Box::new(error)),
            },
            other => other,
        }
    }

    pub fn application_error(&self) -> Option<&ApplicationError> {
        match self {
            Self::CommitFailure {
                application_error, ..
            }
            | Self::RollbackFailure {
                application_error, ..
            }
            | Self::System {
                application_error, ..
            } => application_error.as_deref(),
            _ => None,
        }
    }
}

pub type TransactionResult<T> = std::result::Result<T, TransactionError>;

/// Outcome of an intercepted invocation that did not succeed
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl InvocationError {
    pub fn as_application(&self) -> Option<&ApplicationError> {
        match self {
            Self::Application(error) => Some(error),
            Self::Transaction(_) => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&TransactionError> {
        match self {
            Self::Transaction(error) => Some(error),
            Self::Application(_) => None,
        }
    }
}

/// Top-level error for bootstrap and embedding applications
#[derive(Debug, Error)]
pub enum StratumError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, StratumError>;
