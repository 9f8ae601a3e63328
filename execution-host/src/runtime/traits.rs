use anyhow::Result;
use async_trait::async_trait;
use host_protocol::Descriptor;
use thiserror::Error;

/// Plain-data handle on one isolation context. The backend keeps the
/// live process handle; only this crosses into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextHandle {
    pub pid: u32,
    /// Port the instance serves forwarded exec payloads on.
    pub control_port: u16,
}

/// The context held on to its resources through the whole bounded
/// teardown sequence. The instance is stuck but still enumerable.
#[derive(Debug, Error)]
#[error("isolation context would not release")]
pub struct TeardownRefused;

/// The seam between the supervisor and whatever actually hosts
/// isolation contexts. Implemented by [`crate::runtime::ProcessBackend`]
/// for worker processes and mocked in supervisor tests.
#[async_trait]
pub trait IsolationBackend: Send + Sync {
    /// Creates and starts a new isolation context for `descriptor`.
    /// May be slow; callers must not hold registry locks across it.
    async fn launch(&self, instance_name: &str, descriptor: &Descriptor)
        -> Result<ContextHandle>;

    /// Tears the context down within bounded time, or reports refusal.
    /// Tearing down a context that already terminated is a success.
    async fn teardown(&self, handle: &ContextHandle) -> Result<(), TeardownRefused>;

    /// The runtime's authoritative enumeration of currently live
    /// contexts, independent of any registry bookkeeping.
    async fn live_contexts(&self) -> Vec<u32>;
}
