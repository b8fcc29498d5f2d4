//! Process-local `JobStore`: a reader-writer-guarded map. Reads proceed
//! in parallel; writes are exclusive. `close()` is a no-op.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::JobStore;
use crate::model::{CompilationJob, CompilationResult, JobId};
use crate::Result;

#[derive(Default)]
pub struct LocalJobStore {
    jobs: RwLock<HashMap<JobId, CompilationJob>>,
    results: RwLock<HashMap<JobId, CompilationResult>>,
}

impl LocalJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for LocalJobStore {
    async fn store(&self, job: &CompilationJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<CompilationJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn store_result(&self, result: &CompilationResult) -> Result<()> {
        self.results
            .write()
            .await
            .insert(result.job_id, result.clone());
        Ok(())
    }

    async fn get_result(&self, id: JobId) -> Result<Option<CompilationResult>> {
        Ok(self.results.read().await.get(&id).cloned())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompilationRequest, JobStatus};
    use uuid::Uuid;

    fn sample_job() -> CompilationJob {
        CompilationJob::new(
            Uuid::new_v4(),
            CompilationRequest {
                code: "".into(),
                language: "cpp".into(),
                compiler: "gcc-13".into(),
                standard: None,
                architecture: None,
                os: None,
                env: vec![],
                timeout_secs: None,
            },
        )
    }

    #[tokio::test]
    async fn test_store_then_get_round_trip() {
        let store = LocalJobStore::new();
        let job = sample_job();
        store.store(&job).await.unwrap();

        let fetched = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = LocalJobStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_replaces_existing_record() {
        let store = LocalJobStore::new();
        let mut job = sample_job();
        store.store(&job).await.unwrap();

        job.mark_processing();
        store.store(&job).await.unwrap();

        let fetched = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Processing);
    }
}
