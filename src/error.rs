//! Error types for producer/consumer pairs.
//!
//! - [`FutureError`]: misuse of the protocol, raised at the call that broke it
//! - [`GetError`]: what a consumer's retrieval yields when it has no value

use thiserror::Error;

use crate::exception::{ErrorCode, Exception};

/// Protocol violations.
///
/// `BrokenPromise` is the odd one out: it is never returned by the call that
/// caused it. A producer dropped without a result stores it in the consumer,
/// and it surfaces later as a [`GetError::Exception`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FutureError {
    /// A result was already set on this pair.
    #[error("promise already satisfied")]
    AlreadySatisfied,

    /// The producer already handed out its consumer.
    #[error("future already retrieved")]
    AlreadyRetrieved,

    /// The consumer was never linked, or its result was already retrieved.
    #[error("no associated state")]
    NoState,

    /// The producer went away without setting a result.
    #[error("broken promise")]
    BrokenPromise,
}

/// Failure outcome of [`Consumer::get`](crate::Consumer::get).
///
/// `Future` is a framework failure; `Code` and `Exception` are results the
/// producer chose to deliver.
#[derive(Error, Debug, Clone)]
pub enum GetError {
    #[error(transparent)]
    Future(#[from] FutureError),

    #[error(transparent)]
    Code(ErrorCode),

    #[error("{0}")]
    Exception(Exception),
}

impl GetError {
    /// True when the producer was dropped before it set a result.
    pub fn is_broken_promise(&self) -> bool {
        match self {
            GetError::Exception(e) => e.downcast_ref::<FutureError>() == Some(&FutureError::BrokenPromise),
            _ => false,
        }
    }
}

/// Convenience alias for protocol-level results.
pub type Result<T, E = FutureError> = std::result::Result<T, E>;
