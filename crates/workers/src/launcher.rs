// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Singularity worker deployment.
//!
//! A worker bundle is `config.yaml` + `.secrets/` + the rendered run
//! script, tarred locally, shipped to the cluster deployment root by scp
//! and extracted there. The scheduler job then pulls the container image
//! (if absent) and runs it; the container joins the broker under the
//! scheduler job name.

use crate::template::render;
use dm_cluster::{ClusterError, SubmitOptions, WorkloadManager};
use dm_core::{ClusterSettings, SubmissionResult, WorkerClassSettings, WorkerIdentity};
use dm_remote::{build_scp, ExecOptions, RemoteError, ShellExecutor};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The run script submitted for every worker job. The bind list and the
/// bootstrap line are rendered per launch.
const RUN_SCRIPT_TEMPLATE: &str = r#"#!/bin/bash
cd {{ deployment_path }}
mkdir -p {{ logs_path }}
if [ ! -f {{ image_file }} ]; then
    singularity pull {{ image_file }} {{ image_url }}
fi
singularity run --home {{ deployment_path }}{{ binds }} {{ image_file }} {{ bootstrap_command }} {{ arguments }}
"#;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("worker {job_name} is already running")]
    AlreadyRunning { job_name: String },
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("failed to stage worker bundle at {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to archive worker bundle: {stderr}")]
    Archive { stderr: String },
    #[error("failed to deploy worker bundle to the cluster: {stderr}")]
    Deploy { stderr: String },
}

/// Everything one worker launch needs.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Scheduler job name, `<prefix>-<class>_<identifier>`
    pub task_name: String,
    pub image_url: String,
    pub bootstrap_command: String,
    pub arguments: Vec<String>,
    pub queue: String,
    pub runtime_limit_secs: u64,
    pub cpus: u32,
    pub memory_mb: u32,
    pub extra_mounts: Vec<PathBuf>,
    pub config_file: PathBuf,
    pub secrets_dir: PathBuf,
    /// Abort when a job with this name prefix is already listed
    pub unique_task_name: bool,
}

/// Spawns one worker. The pool controller depends on this seam so ticks
/// can be tested without a cluster.
#[async_trait::async_trait]
pub trait WorkerSpawner: Send + Sync {
    async fn spawn(
        &self,
        identity: &WorkerIdentity,
        class_settings: &WorkerClassSettings,
    ) -> Result<SubmissionResult, LaunchError>;
}

/// Production launcher: stage, tar, scp, extract, submit.
pub struct SingularityLauncher {
    manager: Arc<dyn WorkloadManager>,
    executor: Arc<dyn ShellExecutor>,
    settings: ClusterSettings,
    config_file: PathBuf,
    secrets_dir: PathBuf,
}

impl SingularityLauncher {
    pub fn new(
        manager: Arc<dyn WorkloadManager>,
        executor: Arc<dyn ShellExecutor>,
        settings: ClusterSettings,
        config_file: PathBuf,
        secrets_dir: PathBuf,
    ) -> Self {
        Self {
            manager,
            executor,
            settings,
            config_file,
            secrets_dir,
        }
    }

    pub async fn launch(&self, request: &LaunchRequest) -> Result<SubmissionResult, LaunchError> {
        if request.unique_task_name {
            let running = self.manager.list(Some(&request.task_name)).await?;
            if !running.is_empty() {
                return Err(LaunchError::AlreadyRunning {
                    job_name: request.task_name.clone(),
                });
            }
        }

        let script = self.render_script(request);
        let staging = self
            .settings
            .temp_dir
            .join(format!("{}-{}", request.task_name, uuid::Uuid::new_v4()));

        let result = self.deploy_and_submit(request, &script, &staging).await;
        // The local staging area is scratch either way; the remote
        // fragment is only removed when deployment never started.
        if let Err(error) = std::fs::remove_dir_all(&staging) {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %staging.display(), %error, "could not remove staging dir");
            }
        }
        result
    }

    async fn deploy_and_submit(
        &self,
        request: &LaunchRequest,
        script: &str,
        staging: &Path,
    ) -> Result<SubmissionResult, LaunchError> {
        let script_name = format!("run_{}.sh", request.task_name);
        self.stage_bundle(staging, &script_name, script)?;

        let bundle = format!("{}.tar.gz", request.task_name);
        let bundle_path = staging.join(&bundle);
        self.archive(staging, &bundle_path).await?;

        let deployment_root = self.settings.deployment_root.to_string_lossy();
        let remote_target = format!(
            "{}@{}:{}/",
            self.settings.user, self.settings.host, deployment_root
        );
        let identity = self
            .settings
            .identity_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let scp = build_scp(&bundle_path, &remote_target, identity.as_deref(), false);
        let copied = self
            .executor
            .execute(&scp, ExecOptions::with_timeout(self.timeout()))
            .await?;
        if !copied.is_success() {
            return Err(LaunchError::Deploy {
                stderr: copied.first_stderr_line().to_string(),
            });
        }

        // From here on a failure leaves the remote fragment in place for
        // operator inspection.
        let extract = format!(
            "{} 'mkdir -p {root}/{name} && tar -xzf {root}/{bundle} -C {root}/{name}'",
            self.ssh_prefix(),
            root = deployment_root,
            name = request.task_name,
            bundle = bundle,
        );
        let extracted = self
            .executor
            .execute(&extract, ExecOptions::with_timeout(self.timeout()))
            .await?;
        if !extracted.is_success() {
            tracing::warn!(
                worker = %request.task_name,
                "remote extract failed; leaving deployed fragment in place"
            );
            return Err(LaunchError::Deploy {
                stderr: extracted.first_stderr_line().to_string(),
            });
        }

        let mut opts = SubmitOptions::new(&request.task_name, &request.queue);
        opts.runtime_limit_secs = request.runtime_limit_secs;
        opts.cpus = request.cpus;
        opts.memory_mb = request.memory_mb;
        opts.account = self.settings.account.clone();
        let submitted = self.manager.submit(script, &opts).await?;
        tracing::info!(
            worker = %request.task_name,
            job_ids = ?submitted.job_ids,
            "launched worker"
        );
        Ok(submitted)
    }

    fn render_script(&self, request: &LaunchRequest) -> String {
        let deployment_path = self
            .settings
            .deployment_root
            .join(&request.task_name)
            .to_string_lossy()
            .into_owned();
        let image_file = request
            .image_url
            .rsplit('/')
            .next()
            .unwrap_or(request.image_url.as_str())
            .to_string();
        let binds: String = request
            .extra_mounts
            .iter()
            .map(|m| format!(" --bind {0}:{0}", m.display()))
            .collect();
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("deployment_path".to_string(), deployment_path.clone());
        vars.insert("logs_path".to_string(), format!("{deployment_path}/logs"));
        vars.insert("image_file".to_string(), image_file);
        vars.insert("image_url".to_string(), request.image_url.clone());
        vars.insert("binds".to_string(), binds);
        vars.insert(
            "bootstrap_command".to_string(),
            request.bootstrap_command.clone(),
        );
        vars.insert("arguments".to_string(), request.arguments.join(" "));
        render(RUN_SCRIPT_TEMPLATE, &vars)
    }

    /// Lay out `config.yaml`, `.secrets/` and the run script under the
    /// staging directory.
    fn stage_bundle(
        &self,
        staging: &Path,
        script_name: &str,
        script: &str,
    ) -> Result<(), LaunchError> {
        let stage = |source: std::io::Error| LaunchError::Stage {
            path: staging.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(staging).map_err(stage)?;
        std::fs::copy(&self.config_file, staging.join("config.yaml")).map_err(stage)?;
        copy_dir(&self.secrets_dir, &staging.join(".secrets")).map_err(stage)?;
        std::fs::write(staging.join(script_name), script).map_err(stage)?;
        Ok(())
    }

    async fn archive(&self, staging: &Path, bundle_path: &Path) -> Result<(), LaunchError> {
        let tar = format!(
            "tar -czf {} -C {} config.yaml .secrets run_*.sh",
            bundle_path.display(),
            staging.display(),
        );
        let result = self
            .executor
            .execute(&tar, ExecOptions::with_timeout(self.timeout()))
            .await?;
        if !result.is_success() {
            return Err(LaunchError::Archive {
                stderr: result.first_stderr_line().to_string(),
            });
        }
        Ok(())
    }

    fn ssh_prefix(&self) -> String {
        dm_remote::build_ssh(&dm_remote::SshParams {
            host: self.settings.host.clone(),
            user: Some(self.settings.user.clone()),
            identity_file: self
                .settings
                .identity_file
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            tunnel_host: self.settings.tunnel_host.clone(),
            tunnel_user: self.settings.tunnel_user.clone(),
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.submit_timeout_secs)
    }
}

#[async_trait::async_trait]
impl WorkerSpawner for SingularityLauncher {
    async fn spawn(
        &self,
        identity: &WorkerIdentity,
        class_settings: &WorkerClassSettings,
    ) -> Result<SubmissionResult, LaunchError> {
        let request = LaunchRequest {
            task_name: identity.job_name(),
            image_url: class_settings.image_url.clone(),
            bootstrap_command: class_settings.bootstrap_command.clone(),
            arguments: vec![identity.class.to_string()],
            queue: class_settings.queue.clone(),
            runtime_limit_secs: class_settings.runtime_limit_secs,
            cpus: class_settings.cpus,
            memory_mb: class_settings.memory_mb,
            extra_mounts: class_settings.extra_mounts.clone(),
            config_file: self.config_file.clone(),
            secrets_dir: self.secrets_dir.clone(),
            unique_task_name: true,
        };
        self.launch(&request).await
    }
}

fn copy_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let to = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &to)?;
        } else {
            std::fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

/// Scripted spawner for pool tests: records identities, optionally fails.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeSpawner {
    spawned: parking_lot::Mutex<Vec<WorkerIdentity>>,
    fail_next: parking_lot::Mutex<bool>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawned(&self) -> Vec<WorkerIdentity> {
        self.spawned.lock().clone()
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock() = true;
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait::async_trait]
impl WorkerSpawner for FakeSpawner {
    async fn spawn(
        &self,
        identity: &WorkerIdentity,
        _class_settings: &WorkerClassSettings,
    ) -> Result<SubmissionResult, LaunchError> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(LaunchError::AlreadyRunning {
                job_name: identity.job_name(),
            });
        }
        self.spawned.lock().push(identity.clone());
        Ok(SubmissionResult {
            return_code: 0,
            job_ids: vec!["42".to_string()],
            ..Default::default()
        })
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
