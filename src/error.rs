//! Error types for the parallel operations.
//!
//! Configuration, shape, and ordering problems are reported before any task
//! is spawned; a panic inside a user kernel surfaces when the owning task is
//! joined. Sibling tasks are never cancelled on failure, they are joined to
//! completion and their results discarded.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by schedulers, chunking, and the parallel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid or mutually exclusive configuration options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Multi-input operation over inputs with differing index domains.
    #[error("input shape mismatch: {0}")]
    DomainMismatch(String),

    /// A pre-built chunk plan was combined with explicit chunking options.
    #[error("pre-built chunk plan conflicts with the scheduler's chunking options")]
    ConflictingChunking,

    /// The operation needs an order-preserving schedule.
    #[error("operation requires an order-preserving schedule: {0}")]
    OrderRequired(String),

    /// The scheduler cannot consume this kind of input.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// Reduction over an empty input without an initial value.
    #[error("cannot reduce an empty input without an initial value")]
    EmptyReduction,

    /// A user kernel or reducer panicked inside a worker task.
    #[error("kernel panicked: {0}")]
    Kernel(String),

    /// The underlying task runtime failed.
    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl Error {
    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a new shape-mismatch error.
    pub fn domain_mismatch(message: impl Into<String>) -> Self {
        Self::DomainMismatch(message.into())
    }

    /// Creates a new ordering-requirement error.
    pub fn order_required(message: impl Into<String>) -> Self {
        Self::OrderRequired(message.into())
    }

    /// Creates a new unsupported-input error.
    pub fn unsupported_input(message: impl Into<String>) -> Self {
        Self::UnsupportedInput(message.into())
    }

    /// Creates a new runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}
