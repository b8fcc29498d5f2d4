//! Persistence for job records and compilation results, with
//! interchangeable process-local and remote key-value-server backends.

pub mod local;
pub mod redis_store;

use async_trait::async_trait;

use crate::model::{CompilationJob, CompilationResult, JobId};
use crate::Result;

pub use local::LocalJobStore;
pub use redis_store::RedisJobStore;

/// Polymorphic over `{Store, Get, StoreResult, GetResult, Close}`.
/// `Store` doubles as the update operation: storing a job with an
/// existing id replaces the record. The store does not enforce
/// state-machine legality — the worker that owns a job is the sole
/// mutator and is responsible for only ever making legal transitions.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn store(&self, job: &CompilationJob) -> Result<()>;

    /// Returns a found flag rather than signaling absence via error.
    async fn get(&self, id: JobId) -> Result<Option<CompilationJob>>;

    async fn store_result(&self, result: &CompilationResult) -> Result<()>;

    async fn get_result(&self, id: JobId) -> Result<Option<CompilationResult>>;

    async fn close(&self) -> Result<()>;
}
