//! Stateless translator from a validated request to a sandbox execution,
//! and back from sandbox output to a `CompilationResult`.

use base64::Engine;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::catalog::{self, default_catalog};
use crate::model::{CompilationJob, CompilationResult, Environment, SandboxConfig};
use crate::sandbox::{self, SandboxBackend};
use crate::{Error, Result};

pub struct CompilerOrchestrator {
    backend: Arc<dyn SandboxBackend>,
    catalog: Vec<Environment>,
}

impl CompilerOrchestrator {
    pub fn new(backend: Arc<dyn SandboxBackend>) -> Self {
        Self {
            backend,
            catalog: default_catalog(),
        }
    }

    pub fn get_supported_environments(&self) -> &[Environment] {
        &self.catalog
    }

    /// Validates a request against the catalog without decoding the
    /// source; used by the lifecycle manager before a job id is issued.
    pub fn validate(&self, language: &str, compiler: &str, standard: Option<&str>) -> Result<()> {
        let env = catalog::find(&self.catalog, language)
            .ok_or_else(|| Error::validation(format!("unsupported language: {language}")))?;
        if !env.compilers.iter().any(|c| c == compiler) {
            return Err(Error::validation(format!(
                "compiler {compiler} not supported for {language}"
            )));
        }
        if let Some(std) = standard {
            if !env.standards.iter().any(|s| s == std) {
                return Err(Error::validation(format!(
                    "standard {std} not supported for {language}"
                )));
            }
        }
        Ok(())
    }

    /// Runs the full compile pipeline for a job already admitted into
    /// the pool, returning the result to persist. Never returns `Err`
    /// for a compile-side failure — infrastructure errors are folded
    /// into the result per the failure taxonomy.
    pub async fn compile(&self, ctx: CancellationToken, job: &CompilationJob) -> CompilationResult {
        match self.compile_inner(ctx, job).await {
            Ok(result) => result,
            Err(e) => CompilationResult {
                job_id: job.id,
                success: false,
                compiled: false,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: sandbox::DID_NOT_RUN_EXIT_CODE,
                duration: std::time::Duration::ZERO,
                timed_out: false,
                error_message: Some(e.to_string()),
            },
        }
    }

    async fn compile_inner(
        &self,
        ctx: CancellationToken,
        job: &CompilationJob,
    ) -> Result<CompilationResult> {
        let req = &job.request;
        self.validate(&req.language, &req.compiler, req.standard.as_deref())?;

        let image_tag = catalog::image_tag(&req.language, &req.compiler);
        let extension = catalog::source_extension(&req.language)
            .ok_or_else(|| Error::validation(format!("no source extension for {}", req.language)))?;

        let source = base64::engine::general_purpose::STANDARD
            .decode(&req.code)
            .map_err(|e| Error::validation(format!("invalid base64 source: {e}")))?;
        let source = String::from_utf8(source)
            .map_err(|e| Error::validation(format!("source is not valid utf-8: {e}")))?;

        let mut env = req.env.clone();
        if let Some(std) = &req.standard {
            env.push(("COMPILE_STANDARD".to_string(), std.clone()));
        }

        let timeout = req
            .timeout_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or(sandbox::MAX_TIMEOUT);

        let config = SandboxConfig {
            job_id: job.id,
            image_tag,
            source,
            source_extension: extension.to_string(),
            working_dir: "/workspace".to_string(),
            env,
            timeout,
        };

        match self.backend.execute(ctx, config).await {
            Ok(output) => Ok(CompilationResult {
                job_id: job.id,
                success: true,
                compiled: output.exit_code == 0 && !output.timed_out,
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.exit_code,
                duration: output.duration,
                timed_out: output.timed_out,
                error_message: None,
            }),
            Err(e) => Ok(CompilationResult {
                job_id: job.id,
                success: false,
                compiled: false,
                stdout: String::new(),
                stderr: String::new(),
                exit_code: sandbox::DID_NOT_RUN_EXIT_CODE,
                duration: std::time::Duration::ZERO,
                timed_out: false,
                error_message: Some(e.to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompilationRequest, SandboxOutput};
    use async_trait::async_trait;
    use uuid::Uuid;

    struct StubBackend {
        output: std::sync::Mutex<Option<Result<SandboxOutput>>>,
    }

    #[async_trait]
    impl SandboxBackend for StubBackend {
        async fn execute(
            &self,
            _ctx: CancellationToken,
            _config: SandboxConfig,
        ) -> Result<SandboxOutput> {
            self.output
                .lock()
                .unwrap()
                .take()
                .expect("stub called more than once")
        }

        async fn image_exists(&self, _image_tag: &str) -> Result<bool> {
            Ok(true)
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn sample_job() -> CompilationJob {
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
    async fn test_success_and_compiled_on_clean_exit() {
        let backend = StubBackend {
            output: std::sync::Mutex::new(Some(Ok(SandboxOutput {
                stdout: "".to_string(),
                stderr: "".to_string(),
                exit_code: 0,
                duration: std::time::Duration::from_millis(50),
                timed_out: false,
            }))),
        };
        let orchestrator = CompilerOrchestrator::new(Arc::new(backend));
        let result = orchestrator.compile(CancellationToken::new(), &sample_job()).await;
        assert!(result.success);
        assert!(result.compiled);
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_success_but_not_compiled_on_nonzero_exit() {
        let backend = StubBackend {
            output: std::sync::Mutex::new(Some(Ok(SandboxOutput {
                stdout: "".to_string(),
                stderr: "error: expected '}'".to_string(),
                exit_code: 1,
                duration: std::time::Duration::from_millis(50),
                timed_out: false,
            }))),
        };
        let orchestrator = CompilerOrchestrator::new(Arc::new(backend));
        let result = orchestrator.compile(CancellationToken::new(), &sample_job()).await;
        assert!(result.success);
        assert!(!result.compiled);
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_exit_code_137() {
        let backend = StubBackend {
            output: std::sync::Mutex::new(Some(Ok(SandboxOutput {
                stdout: "".to_string(),
                stderr: "".to_string(),
                exit_code: 137,
                duration: std::time::Duration::from_secs(30),
                timed_out: true,
            }))),
        };
        let orchestrator = CompilerOrchestrator::new(Arc::new(backend));
        let result = orchestrator.compile(CancellationToken::new(), &sample_job()).await;
        assert!(result.success);
        assert!(!result.compiled);
        assert!(result.timed_out);
        assert_eq!(result.exit_code, 137);
    }

    #[tokio::test]
    async fn test_infrastructure_error_is_not_success() {
        let backend = StubBackend {
            output: std::sync::Mutex::new(Some(Err(Error::infrastructure("connection lost")))),
        };
        let orchestrator = CompilerOrchestrator::new(Arc::new(backend));
        let result = orchestrator.compile(CancellationToken::new(), &sample_job()).await;
        assert!(!result.success);
        assert!(!result.compiled);
        assert_eq!(result.exit_code, -1);
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn test_rejects_unsupported_language_before_backend_call() {
        let backend = StubBackend {
            output: std::sync::Mutex::new(None),
        };
        let orchestrator = CompilerOrchestrator::new(Arc::new(backend));
        let mut job = sample_job();
        job.request.language = "cobol".to_string();
        let result = orchestrator.compile(CancellationToken::new(), &job).await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("unsupported language"));
    }
}
