//! `LocalContainer`: one-shot Docker container per compile, optimal for
//! single-host deployments.

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, WaitContainerOptions,
};
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use super::ansi;
use super::output::BoundedBuffer;
use super::{clamp_timeout, SandboxBackend, DID_NOT_RUN_EXIT_CODE, TIMEOUT_EXIT_CODE};
use crate::model::{SandboxConfig, SandboxOutput};
use crate::{Error, Result};

const WORKSPACE_DIR: &str = "/workspace";
const COMPILE_DRIVER: &str = "/usr/bin/compile.sh";
const TMPFS_SIZE_BYTES: i64 = 64 * 1024 * 1024;
const MEMORY_LIMIT_BYTES: i64 = 128 * 1024 * 1024;
const NANO_CPUS: i64 = 500_000_000; // 0.5 core
const PIDS_LIMIT: i64 = 100;

pub struct LocalContainer {
    docker: Docker,
}

impl LocalContainer {
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::infrastructure(format!("docker connect failed: {e}")))?;
        Ok(Self { docker })
    }

    fn host_config(&self) -> HostConfig {
        HostConfig {
            memory: Some(MEMORY_LIMIT_BYTES),
            memory_swap: Some(MEMORY_LIMIT_BYTES), // no swap beyond the memory cap
            nano_cpus: Some(NANO_CPUS),
            pids_limit: Some(PIDS_LIMIT),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            network_mode: Some("none".to_string()),
            readonly_rootfs: Some(false),
            mounts: Some(vec![Mount {
                target: Some("/tmp".to_string()),
                typ: Some(MountTypeEnum::TMPFS),
                tmpfs_options: Some(bollard::models::MountTmpfsOptions {
                    size_bytes: Some(TMPFS_SIZE_BYTES),
                    mode: Some(0o1777),
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    /// Builds an in-memory tar stream containing the source file, then
    /// copies it into the container before start — matching the
    /// create-then-copy-then-start ordering the contract requires.
    fn build_source_tar(config: &SandboxConfig) -> Result<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());
        let name = format!("source.{}", config.source_extension);
        let data = config.source.as_bytes();

        let mut header = tar::Header::new_gnu();
        header.set_path(&name)?;
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, data)?;

        builder
            .into_inner()
            .map_err(|e| Error::infrastructure(format!("tar build failed: {e}")))
    }
}

#[async_trait]
impl SandboxBackend for LocalContainer {
    async fn execute(&self, ctx: CancellationToken, config: SandboxConfig) -> Result<SandboxOutput> {
        let timeout = clamp_timeout(config.timeout);
        let started = std::time::Instant::now();

        let container_name = format!("compileforge-{}", config.job_id);
        let mut env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        env.push(format!("SOURCE_PATH={}/{}", WORKSPACE_DIR, format!("source.{}", config.source_extension)));

        let mut labels = HashMap::new();
        labels.insert("compileforge.job".to_string(), config.job_id.to_string());

        let create_opts = CreateContainerOptions {
            name: container_name.clone(),
            platform: None,
        };
        let container_cfg = ContainerConfig {
            image: Some(config.image_tag.clone()),
            cmd: Some(vec![COMPILE_DRIVER.to_string()]),
            env: Some(env),
            working_dir: Some(WORKSPACE_DIR.to_string()),
            user: Some("65534:65534".to_string()),
            labels: Some(labels),
            host_config: Some(self.host_config()),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(create_opts), container_cfg)
            .await?;
        let container_id = created.id;

        let tar_bytes = Self::build_source_tar(&config)?;
        self.docker
            .upload_to_container(
                &container_id,
                Some(bollard::container::UploadToContainerOptions {
                    path: WORKSPACE_DIR.to_string(),
                    no_overwrite_dir_non_dir: "false".to_string(),
                }),
                tar_bytes.into(),
            )
            .await?;

        self.docker
            .start_container::<String>(&container_id, None)
            .await?;

        let wait_result = tokio::select! {
            res = self.wait_for_container(&container_id) => res,
            _ = tokio::time::sleep(timeout) => Err(Error::infrastructure("sandbox timeout")),
            _ = ctx.cancelled() => Err(Error::infrastructure("caller cancelled")),
        };

        let timed_out = wait_result.is_err();
        if timed_out {
            let _ = self
                .docker
                .kill_container::<String>(&container_id, None)
                .await;
        }

        let (stdout, stderr) = self.collect_logs(&container_id).await.unwrap_or_default();

        // cleanup is cancellation-immune: runs on a detached task with a
        // fresh, never-cancelled scope regardless of what happened above.
        let docker = self.docker.clone();
        let cleanup_id = container_id.clone();
        tokio::spawn(async move {
            let _ = docker
                .remove_container(
                    &cleanup_id,
                    Some(RemoveContainerOptions {
                        force: true,
                        v: true,
                        ..Default::default()
                    }),
                )
                .await;
        });

        let exit_code = if timed_out {
            TIMEOUT_EXIT_CODE
        } else {
            wait_result.unwrap_or(DID_NOT_RUN_EXIT_CODE)
        };

        Ok(SandboxOutput {
            stdout: ansi::strip(&stdout),
            stderr: ansi::strip(&stderr),
            exit_code,
            duration: started.elapsed(),
            timed_out,
        })
    }

    async fn image_exists(&self, image_tag: &str) -> Result<bool> {
        match self.docker.inspect_image(image_tag).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl LocalContainer {
    async fn wait_for_container(&self, container_id: &str) -> Result<i32> {
        let mut stream = self.docker.wait_container(
            container_id,
            Some(WaitContainerOptions {
                condition: "not-running",
            }),
        );
        match stream.next().await {
            Some(Ok(res)) => Ok(res.status_code as i32),
            Some(Err(e)) => Err(e.into()),
            None => Err(Error::infrastructure("container wait stream closed early")),
        }
    }

    async fn collect_logs(&self, container_id: &str) -> Result<(String, String)> {
        let mut stdout_buf = BoundedBuffer::new();
        let mut stderr_buf = BoundedBuffer::new();

        let mut stream = self.docker.logs(
            container_id,
            Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => stdout_buf.push(&message),
                Ok(LogOutput::StdErr { message }) => stderr_buf.push(&message),
                Ok(LogOutput::Console { message }) => stdout_buf.push(&message),
                Ok(LogOutput::StdIn { .. }) => {}
                Err(_) => break,
            }
        }

        Ok((stdout_buf.into_string(), stderr_buf.into_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SandboxConfig;
    use uuid::Uuid;

    #[test]
    fn test_build_source_tar_contains_entry() {
        let config = SandboxConfig {
            job_id: Uuid::new_v4(),
            image_tag: "compileforge/cpp-gcc-13:latest".to_string(),
            source: "int main(){return 0;}".to_string(),
            source_extension: "cpp".to_string(),
            working_dir: WORKSPACE_DIR.to_string(),
            env: vec![],
            timeout: std::time::Duration::from_secs(5),
        };
        let tar_bytes = LocalContainer::build_source_tar(&config).unwrap();
        assert!(!tar_bytes.is_empty());
    }
}
