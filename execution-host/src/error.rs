//! Lifecycle error taxonomy. These are returned to the immediate
//! caller as values; nothing in the lifecycle surface aborts the
//! caller's control flow.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartError {
    /// The requested class is absent from the catalog. No side effects.
    #[error("service class '{0}' is not registered")]
    UnknownService(String),

    /// Name disambiguation exceeded its attempt bound. No side effects.
    #[error("no free instance name for '{0}' after {1} attempts")]
    NamesExhausted(String, usize),

    /// The isolation context could not be created. The registry was not
    /// touched.
    #[error("failed to create isolation context: {0:#}")]
    ContextCreation(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum StopError {
    /// The instance name is not tracked. No side effects.
    #[error("instance '{0}' is not running")]
    UnknownInstance(String),

    /// The context would not release within the teardown bounds. The
    /// registry entry is retained; the instance stays enumerable.
    #[error("instance '{0}' refused teardown")]
    TeardownRefused(String),
}
