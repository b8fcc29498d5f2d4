//! `ClusterJob`: a batch Job resource per compile, for horizontally
//! scaled deployments behind a Kubernetes-shaped scheduler.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job as K8sJob, JobSpec};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, PodTemplateSpec, Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, LogParams, PostParams};
use kube::runtime::wait::{await_condition, Condition};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use super::ansi;
use super::output::BoundedBuffer;
use super::{clamp_timeout, SandboxBackend, DID_NOT_RUN_EXIT_CODE, TIMEOUT_EXIT_CODE};
use crate::model::{SandboxConfig, SandboxOutput};
use crate::{Error, Result};

const NAMESPACE: &str = "compileforge-jobs";
const SELF_TTL_SECS: i32 = 300;

pub struct ClusterJob {
    client: Client,
}

impl ClusterJob {
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    fn job_name(config: &SandboxConfig) -> String {
        format!("compileforge-job-{}", config.job_id)
    }

    fn build_job(&self, config: &SandboxConfig, configmap_name: &str) -> K8sJob {
        let name = Self::job_name(config);
        let mut labels = BTreeMap::new();
        labels.insert("compileforge.job".to_string(), config.job_id.to_string());

        let env = config
            .env
            .iter()
            .map(|(k, v)| k8s_openapi::api::core::v1::EnvVar {
                name: k.clone(),
                value: Some(v.clone()),
                ..Default::default()
            })
            .collect();

        let source_file = format!("source.{}", config.source_extension);

        K8sJob {
            metadata: ObjectMeta {
                name: Some(name),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(JobSpec {
                backoff_limit: Some(0),
                ttl_seconds_after_finished: Some(SELF_TTL_SECS),
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        restart_policy: Some("Never".to_string()),
                        containers: vec![Container {
                            name: "compile".to_string(),
                            image: Some(config.image_tag.clone()),
                            command: Some(vec!["/usr/bin/compile.sh".to_string()]),
                            env: Some(env),
                            working_dir: Some(config.working_dir.clone()),
                            volume_mounts: Some(vec![VolumeMount {
                                name: "source".to_string(),
                                mount_path: config.working_dir.clone(),
                                read_only: Some(true),
                                sub_path: Some(source_file),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }],
                        volumes: Some(vec![Volume {
                            name: "source".to_string(),
                            config_map: Some(
                                k8s_openapi::api::core::v1::ConfigMapVolumeSource {
                                    name: Some(configmap_name.to_string()),
                                    ..Default::default()
                                },
                            ),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                    metadata: Some(ObjectMeta::default()),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn build_configmap(
        &self,
        config: &SandboxConfig,
    ) -> k8s_openapi::api::core::v1::ConfigMap {
        let mut data = BTreeMap::new();
        data.insert(
            format!("source.{}", config.source_extension),
            config.source.clone(),
        );
        k8s_openapi::api::core::v1::ConfigMap {
            metadata: ObjectMeta {
                name: Some(format!("compileforge-src-{}", config.job_id)),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }
}

/// True once the Job has reached either its `Complete` or `Failed`
/// condition. `is_job_completed()` alone never fires for a Job built with
/// `backoff_limit: 0` whose container exits non-zero, which would
/// otherwise be mistaken for a hung job and reported as a timeout.
fn is_job_terminal() -> impl Condition<K8sJob> {
    |obj: Option<&K8sJob>| {
        obj.and_then(|job| job.status.as_ref())
            .and_then(|s| s.conditions.as_ref())
            .map(|conds| {
                conds
                    .iter()
                    .any(|c| matches!(c.type_.as_str(), "Complete" | "Failed") && c.status == "True")
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl SandboxBackend for ClusterJob {
    async fn execute(&self, ctx: CancellationToken, config: SandboxConfig) -> Result<SandboxOutput> {
        let timeout = clamp_timeout(config.timeout);
        let started = std::time::Instant::now();

        let configmaps: Api<k8s_openapi::api::core::v1::ConfigMap> =
            Api::namespaced(self.client.clone(), NAMESPACE);
        let jobs: Api<K8sJob> = Api::namespaced(self.client.clone(), NAMESPACE);
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), NAMESPACE);

        let cm = self.build_configmap(&config);
        let cm_name = cm.metadata.name.clone().unwrap();
        configmaps.create(&PostParams::default(), &cm).await?;

        let job = self.build_job(&config, &cm_name);
        let job_name = job.metadata.name.clone().unwrap();
        jobs.create(&PostParams::default(), &job).await?;

        let wait_result = tokio::select! {
            res = await_condition(jobs.clone(), &job_name, is_job_terminal()) => {
                res.map_err(|e| Error::infrastructure(e.to_string()))
            },
            _ = tokio::time::sleep(timeout) => Err(Error::infrastructure("sandbox timeout")),
            _ = ctx.cancelled() => Err(Error::infrastructure("caller cancelled")),
        };
        let timed_out = wait_result.is_err();

        let list_params = ListParams::default().labels(&format!("compileforge.job={}", config.job_id));
        let pod_list = pods.list(&list_params).await.unwrap_or_default();
        let pod = pod_list.items.into_iter().next();
        let pod_name = pod.as_ref().and_then(|p| p.metadata.name.clone());

        // The cluster log API may not reliably separate stdout/stderr; if
        // it cannot, the full log goes to stdout and stderr stays empty.
        let mut stdout_buf = super::output::BoundedBuffer::new();
        if let Some(name) = &pod_name {
            if let Ok(log) = pods
                .logs(
                    name,
                    &LogParams {
                        container: Some("compile".to_string()),
                        ..Default::default()
                    },
                )
                .await
            {
                stdout_buf.push(log.as_bytes());
            }
        }
        let stdout = ansi::strip(&stdout_buf.into_string());
        let stderr = String::new();

        // Whether the job reached `Complete` or `Failed`, the real exit
        // code comes from the container's own terminated state, same as
        // `LocalContainer` reads it off the Docker wait response.
        let exit_code = if timed_out {
            TIMEOUT_EXIT_CODE
        } else {
            pod.as_ref()
                .and_then(|p| p.status.as_ref())
                .and_then(|s| s.container_statuses.as_ref())
                .and_then(|statuses| statuses.iter().find(|c| c.name == "compile"))
                .and_then(|c| c.state.as_ref())
                .and_then(|s| s.terminated.as_ref())
                .map(|t| t.exit_code)
                .unwrap_or(DID_NOT_RUN_EXIT_CODE)
        };

        // cancellation-immune cleanup: detached, runs regardless of the
        // caller's own cancellation.
        let jobs_cleanup = jobs.clone();
        let configmaps_cleanup = configmaps.clone();
        let job_name_cleanup = job_name.clone();
        let cm_name_cleanup = cm_name.clone();
        tokio::spawn(async move {
            let _ = jobs_cleanup
                .delete(&job_name_cleanup, &DeleteParams::background())
                .await;
            let _ = configmaps_cleanup
                .delete(&cm_name_cleanup, &DeleteParams::default())
                .await;
        });

        Ok(SandboxOutput {
            stdout,
            stderr,
            exit_code,
            duration: started.elapsed(),
            timed_out,
        })
    }

    async fn image_exists(&self, _image_tag: &str) -> Result<bool> {
        // Validation is deferred to the cluster's own image pull.
        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn dummy_config() -> SandboxConfig {
        SandboxConfig {
            job_id: Uuid::new_v4(),
            image_tag: "compileforge/cpp-gcc-13:latest".to_string(),
            source: "int main(){return 0;}".to_string(),
            source_extension: "cpp".to_string(),
            working_dir: "/workspace".to_string(),
            env: vec![],
            timeout: std::time::Duration::from_secs(5),
        }
    }

    #[test]
    fn test_job_name_is_stable_per_job_id() {
        let config = dummy_config();
        let a = ClusterJob::job_name(&config);
        let b = ClusterJob::job_name(&config);
        assert_eq!(a, b);
        assert!(a.contains(&config.job_id.to_string()));
    }
}
