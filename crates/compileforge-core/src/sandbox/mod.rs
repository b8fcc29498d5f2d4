//! Sandbox backend abstraction: a uniform `Execute`/`ImageExists`/`Close`
//! contract with two interchangeable implementations.

pub mod ansi;
pub mod cluster_job;
pub mod local_container;
pub mod output;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::model::{SandboxConfig, SandboxOutput};
use crate::Result;

pub use cluster_job::ClusterJob;
pub use local_container::LocalContainer;

/// Maximum captured size for stdout/stderr, per stream.
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Hard ceiling on a single compile's wall-clock time, regardless of what
/// the request asks for.
pub const MAX_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Exit code reported when the sandbox had to kill the process for
/// exceeding its deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 137;

/// Sentinel exit code used by the orchestrator when the backend never
/// ran the command at all (an infrastructure error).
pub const DID_NOT_RUN_EXIT_CODE: i32 = -1;

/// Polymorphic over `{Execute, ImageExists, Close}`. Both implementations
/// must satisfy identical pre/post-conditions so the orchestrator is
/// oblivious to which backend is in use.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Runs exactly one compile inside a confined environment. `ctx` is
    /// the caller's cancellation scope for the compile phase only —
    /// cleanup always runs to completion regardless of `ctx`.
    async fn execute(&self, ctx: CancellationToken, config: SandboxConfig) -> Result<SandboxOutput>;

    /// Whether the given image tag is available to run. `ClusterJob`
    /// defers this check to the cluster scheduler's own image pull and
    /// always returns `true`.
    async fn image_exists(&self, image_tag: &str) -> Result<bool>;

    /// Releases any backend-wide resources (connection pools, clients).
    async fn close(&self) -> Result<()>;
}

fn clamp_timeout(requested: std::time::Duration) -> std::time::Duration {
    requested.min(MAX_TIMEOUT)
}
