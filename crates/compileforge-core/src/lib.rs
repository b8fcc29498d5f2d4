pub mod catalog;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod orchestrator;
pub mod sandbox;
pub mod stats;
pub mod store;
pub mod worker_pool;

pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::LifecycleManager;
pub use model::{
    CompilationJob, CompilationRequest, CompilationResult, Environment, JobId, JobStatus,
    SandboxConfig, SandboxOutput, WorkerStats,
};
pub use orchestrator::CompilerOrchestrator;
pub use sandbox::{ClusterJob, LocalContainer, SandboxBackend};
pub use store::{JobStore, LocalJobStore, RedisJobStore};
pub use worker_pool::WorkerPool;

/// Current version of compileforge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Selects a sandbox backend based on the runtime environment: a
/// `ClusterJob` backend when cluster-host indicators are present,
/// `LocalContainer` otherwise.
pub async fn select_sandbox_backend() -> Result<std::sync::Arc<dyn SandboxBackend>> {
    if Config::cluster_detected() {
        tracing::info!("cluster environment detected; using ClusterJob sandbox backend");
        Ok(std::sync::Arc::new(ClusterJob::new().await?))
    } else {
        tracing::info!("using LocalContainer sandbox backend");
        Ok(std::sync::Arc::new(LocalContainer::new()?))
    }
}

/// Builds the job store configured by `cfg`: a Redis-backed store when
/// enabled, otherwise the in-process map.
pub async fn select_job_store(cfg: &Config) -> Result<std::sync::Arc<dyn JobStore>> {
    if cfg.redis.enabled {
        tracing::info!(addr = %cfg.redis.addr, "using redis job store");
        Ok(std::sync::Arc::new(
            RedisJobStore::connect(&cfg.redis.addr, cfg.redis.job_ttl_hours).await?,
        ))
    } else {
        tracing::info!("using in-process job store");
        Ok(std::sync::Arc::new(LocalJobStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
    }
}
