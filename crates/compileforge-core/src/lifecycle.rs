//! Job Lifecycle Manager: the thin service boundary consumed by the
//! HTTP layer. Owns id generation and admission into the worker pool.

use std::sync::Arc;
use uuid::Uuid;

use crate::model::{CompilationJob, CompilationRequest, CompilationResult, JobId};
use crate::orchestrator::CompilerOrchestrator;
use crate::store::JobStore;
use crate::worker_pool::WorkerPool;
use crate::Result;

pub struct LifecycleManager {
    store: Arc<dyn JobStore>,
    pool: Arc<WorkerPool>,
    orchestrator: Arc<CompilerOrchestrator>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        pool: Arc<WorkerPool>,
        orchestrator: Arc<CompilerOrchestrator>,
    ) -> Self {
        Self {
            store,
            pool,
            orchestrator,
        }
    }

    /// Validates and admits a request. Malformed requests are rejected
    /// before any job id is issued. A full queue still issues an id, but
    /// the job is immediately persisted as `Failed`.
    pub async fn submit(&self, request: CompilationRequest) -> Result<(JobId, bool)> {
        self.orchestrator.validate(
            &request.language,
            &request.compiler,
            request.standard.as_deref(),
        )?;

        let id = Uuid::new_v4();
        let mut job = CompilationJob::new(id, request);
        self.store.store(&job).await?;

        if self.pool.enqueue(job.clone()) {
            Ok((id, true))
        } else {
            job.mark_failed("service overloaded");
            self.store.store(&job).await?;
            Ok((id, false))
        }
    }

    pub async fn fetch(&self, id: JobId) -> Result<(Option<CompilationJob>, Option<CompilationResult>)> {
        let job = self.store.get(id).await?;
        let result = match &job {
            Some(job) if job.status.is_terminal() => self.store.get_result(id).await?,
            _ => None,
        };
        Ok((job, result))
    }

    pub fn pool_stats(&self) -> crate::model::WorkerStats {
        self.pool.stats()
    }

    pub fn supported_environments(&self) -> &[crate::model::Environment] {
        self.orchestrator.get_supported_environments()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxBackend;
    use crate::store::LocalJobStore;
    use async_trait::async_trait;
    use base64::Engine;
    use tokio_util::sync::CancellationToken;

    struct InstantBackend;

    #[async_trait]
    impl SandboxBackend for InstantBackend {
        async fn execute(
            &self,
            _ctx: CancellationToken,
            _config: crate::model::SandboxConfig,
        ) -> Result<crate::model::SandboxOutput> {
            Ok(crate::model::SandboxOutput {
                stdout: "ok".to_string(),
                stderr: String::new(),
                exit_code: 0,
                duration: std::time::Duration::from_millis(1),
                timed_out: false,
            })
        }

        async fn image_exists(&self, _image_tag: &str) -> Result<bool> {
            Ok(true)
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn sample_request() -> CompilationRequest {
        CompilationRequest {
            code: base64::engine::general_purpose::STANDARD.encode("int main(){return 0;}"),
            language: "cpp".to_string(),
            compiler: "gcc-13".to_string(),
            standard: Some("c++20".to_string()),
            architecture: None,
            os: None,
            env: vec![],
            timeout_secs: None,
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_unknown_language_without_issuing_id() {
        let store: Arc<dyn JobStore> = Arc::new(LocalJobStore::new());
        let orchestrator = Arc::new(CompilerOrchestrator::new(Arc::new(InstantBackend)));
        let pool = WorkerPool::start(1, 1, store.clone(), orchestrator.clone());
        let manager = LifecycleManager::new(store, pool, orchestrator);

        let mut req = sample_request();
        req.language = "cobol".to_string();
        let res = manager.submit(req).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_submit_then_fetch_eventually_terminal() {
        let store: Arc<dyn JobStore> = Arc::new(LocalJobStore::new());
        let orchestrator = Arc::new(CompilerOrchestrator::new(Arc::new(InstantBackend)));
        let pool = WorkerPool::start(2, 4, store.clone(), orchestrator.clone());
        let manager = LifecycleManager::new(store, pool, orchestrator);

        let (id, accepted) = manager.submit(sample_request()).await.unwrap();
        assert!(accepted);

        for _ in 0..50 {
            let (job, result) = manager.fetch(id).await.unwrap();
            if let Some(job) = job {
                if job.status.is_terminal() {
                    assert!(result.is_some());
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn test_overloaded_queue_marks_job_failed() {
        let store: Arc<dyn JobStore> = Arc::new(LocalJobStore::new());
        let orchestrator = Arc::new(CompilerOrchestrator::new(Arc::new(InstantBackend)));
        // zero workers: nothing drains, one-slot queue fills after the
        // first submission.
        let pool = WorkerPool::start(0, 1, store.clone(), orchestrator.clone());
        let manager = LifecycleManager::new(store, pool, orchestrator);

        let (_, first_accepted) = manager.submit(sample_request()).await.unwrap();
        assert!(first_accepted);

        let (id, accepted) = manager.submit(sample_request()).await.unwrap();
        assert!(!accepted);

        let (job, _) = manager.fetch(id).await.unwrap();
        let job = job.unwrap();
        assert!(job.status.is_terminal());
        assert_eq!(job.error_message.as_deref(), Some("service overloaded"));
    }
}
