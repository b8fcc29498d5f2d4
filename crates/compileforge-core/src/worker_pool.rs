//! Fixed-size worker pool over a bounded queue. The bounded channel is
//! the sole cross-worker synchronization primitive besides the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::model::{CompilationJob, WorkerStats};
use crate::orchestrator::CompilerOrchestrator;
use crate::stats::{Outcome, StatsRegistry};
use crate::store::JobStore;
use crate::Result;

/// Deadline `Close()` waits for in-flight jobs to drain before giving up.
const SHUTDOWN_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub struct WorkerPool {
    sender: std::sync::Mutex<Option<mpsc::Sender<CompilationJob>>>,
    stats: Arc<StatsRegistry>,
    closed: AtomicBool,
    handles: tokio::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `max_workers` worker tasks pulling from a bounded channel
    /// of depth `queue_size`.
    pub fn start(
        max_workers: usize,
        queue_size: usize,
        store: Arc<dyn JobStore>,
        orchestrator: Arc<CompilerOrchestrator>,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel::<CompilationJob>(queue_size);
        let stats = Arc::new(StatsRegistry::new(max_workers));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let mut handles = Vec::with_capacity(max_workers);
        for worker_id in 0..max_workers {
            let receiver = receiver.clone();
            let store = store.clone();
            let orchestrator = orchestrator.clone();
            let stats = stats.clone();
            handles.push(tokio::spawn(Self::run_worker(
                worker_id, receiver, store, orchestrator, stats,
            )));
        }

        Arc::new(Self {
            sender: std::sync::Mutex::new(Some(sender)),
            stats,
            closed: AtomicBool::new(false),
            handles: tokio::sync::Mutex::new(handles),
        })
    }

    /// Non-blocking admission: `try_send` either succeeds immediately or
    /// reports the queue as full, which the lifecycle manager surfaces
    /// to the client as an overload response.
    pub fn enqueue(&self, job: CompilationJob) -> bool {
        let guard = self.sender.lock().unwrap();
        let sent = match guard.as_ref() {
            Some(sender) => sender.try_send(job).is_ok(),
            None => false,
        };
        if sent {
            self.stats.job_enqueued();
        }
        sent
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.snapshot()
    }

    /// Closes the queue and waits, up to a deadline, for in-flight jobs
    /// to finish. Jobs still sitting in the channel are dropped along
    /// with it and remain `Queued` in the store.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Dropping the sender closes the channel: workers blocked on an
        // empty queue observe `recv() == None` and exit immediately.
        self.sender.lock().unwrap().take();

        let mut handles = self.handles.lock().await;
        let joins = std::mem::take(&mut *handles);
        let all = futures_join_all(joins);
        match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, all).await {
            Ok(_) => info!("worker pool drained cleanly"),
            Err(_) => warn!("worker pool shutdown deadline exceeded; some workers still draining"),
        }
        Ok(())
    }

    async fn run_worker(
        worker_id: usize,
        receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<CompilationJob>>>,
        store: Arc<dyn JobStore>,
        orchestrator: Arc<CompilerOrchestrator>,
        stats: Arc<StatsRegistry>,
    ) {
        loop {
            let job = {
                let mut rx = receiver.lock().await;
                rx.recv().await
            };
            let mut job = match job {
                Some(job) => job,
                None => {
                    info!(worker_id, "worker shutting down, channel closed");
                    return;
                }
            };

            stats.job_dequeued();
            stats.worker_started();

            job.mark_processing();
            if let Err(e) = store.store(&job).await {
                error!(worker_id, job_id = %job.id, error = %e, "failed to persist processing transition");
                stats.record_outcome(Outcome::Error);
            }

            let result = orchestrator.compile(CancellationToken::new(), &job).await;

            if result.success {
                job.mark_completed();
            } else {
                job.mark_failed(
                    result
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "infrastructure error".to_string()),
                );
            }

            if let Err(e) = store.store(&job).await {
                error!(worker_id, job_id = %job.id, error = %e, "failed to persist terminal job state");
            }
            if let Err(e) = store.store_result(&result).await {
                error!(worker_id, job_id = %job.id, error = %e, "failed to persist result");
            }

            let outcome = if !result.success {
                Outcome::Error
            } else if result.timed_out {
                Outcome::Timeout
            } else if result.compiled {
                Outcome::Successful
            } else {
                Outcome::Failed
            };
            stats.record_outcome(outcome);

            stats.worker_finished();
        }
    }
}

async fn futures_join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompilationRequest, SandboxOutput};
    use crate::sandbox::SandboxBackend;
    use crate::store::LocalJobStore;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct InstantBackend;

    #[async_trait]
    impl SandboxBackend for InstantBackend {
        async fn execute(
            &self,
            _ctx: CancellationToken,
            _config: crate::model::SandboxConfig,
        ) -> Result<SandboxOutput> {
            Ok(SandboxOutput {
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

    fn sample_job() -> CompilationJob {
        use base64::Engine;
        CompilationJob::new(
            Uuid::new_v4(),
            CompilationRequest {
                code: base64::engine::general_purpose::STANDARD.encode("int main(){return 0;}"),
                language: "cpp".to_string(),
                compiler: "gcc-13".to_string(),
                standard: Some("c++20".to_string()),
                architecture: None,
                os: None,
                env: vec![],
                timeout_secs: None,
            },
        )
    }

    #[tokio::test]
    async fn test_enqueue_then_processed_to_completion() {
        let store: Arc<dyn JobStore> = Arc::new(LocalJobStore::new());
        let orchestrator = Arc::new(CompilerOrchestrator::new(Arc::new(InstantBackend)));
        let pool = WorkerPool::start(2, 4, store.clone(), orchestrator);

        let job = sample_job();
        let job_id = job.id;
        store.store(&job).await.unwrap();
        assert!(pool.enqueue(job));

        for _ in 0..50 {
            if let Some(fetched) = store.get(job_id).await.unwrap() {
                if fetched.status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let fetched = store.get(job_id).await.unwrap().unwrap();
        assert!(fetched.status.is_terminal());
        let result = store.get_result(job_id).await.unwrap().unwrap();
        assert!(result.compiled);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let store: Arc<dyn JobStore> = Arc::new(LocalJobStore::new());
        let orchestrator = Arc::new(CompilerOrchestrator::new(Arc::new(InstantBackend)));
        // Zero workers: nothing drains the channel, so it fills up.
        let pool = WorkerPool::start(0, 1, store, orchestrator);

        assert!(pool.enqueue(sample_job()));
        assert!(!pool.enqueue(sample_job()));
    }
}
