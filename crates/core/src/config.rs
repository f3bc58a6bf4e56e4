// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration tree.
//!
//! Loaded once from a YAML file at startup. String values of the form
//! `<secret_file:NAME>` are replaced at load time with the trimmed
//! contents of `<secrets_dir>/NAME`; a missing secret file is fatal.
//! Settings are immutable after load — the daemon swaps a fresh
//! `Arc<Settings>` when the file changes on disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading configuration. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
    #[error("secret file not found: {0}")]
    MissingSecret(PathBuf),
    #[error("configuration references secrets but no secrets directory was given")]
    SecretsDirRequired,
}

/// Which batch scheduler fronts the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadManagerKind {
    Lsf,
    Slurm,
}

/// SSH endpoint and scheduler parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSettings {
    pub host: String,
    pub user: String,
    pub identity_file: Option<PathBuf>,
    /// Optional intermediate hop; when set, SSH invocations are chained.
    #[serde(default)]
    pub tunnel_host: Option<String>,
    #[serde(default)]
    pub tunnel_user: Option<String>,
    pub workload_manager: WorkloadManagerKind,
    /// Project prefix stamped onto every submitted job
    pub job_prefix: String,
    pub default_queue: String,
    /// Local scratch area for rendered submission scripts and staging
    pub temp_dir: PathBuf,
    /// Remote root under which worker bundles are deployed
    pub deployment_root: PathBuf,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,
    #[serde(default = "default_kill_timeout")]
    pub kill_timeout_secs: u64,
    #[serde(default = "default_submit_timeout")]
    pub list_timeout_secs: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
}

fn default_submit_timeout() -> u64 {
    30
}

fn default_kill_timeout() -> u64 {
    15
}

fn default_ping_timeout() -> u64 {
    10
}

/// Shared cache connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub redis_url: String,
    /// TTL applied to task descriptors
    #[serde(default = "default_ttl")]
    pub default_ttl_secs: u64,
}

fn default_ttl() -> u64 {
    3600
}

/// Desired state for one worker class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerClassSettings {
    pub min: u32,
    pub max: u32,
    pub max_uptime_secs: u64,
    pub queue: String,
    pub image_url: String,
    pub bootstrap_command: String,
    #[serde(default)]
    pub extra_mounts: Vec<PathBuf>,
    #[serde(default = "default_worker_runtime")]
    pub runtime_limit_secs: u64,
    #[serde(default = "default_worker_cpus")]
    pub cpus: u32,
    #[serde(default = "default_worker_memory")]
    pub memory_mb: u32,
}

fn default_worker_runtime() -> u64 {
    // 7 days
    7 * 24 * 3600
}

fn default_worker_cpus() -> u32 {
    2
}

fn default_worker_memory() -> u32 {
    8192
}

/// Worker pool reconciliation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolSettings {
    pub datamover: WorkerClassSettings,
    pub vm: WorkerClassSettings,
    #[serde(default = "default_monitor_key")]
    pub monitor_key_prefix: String,
    /// TTL of the per-class reconciliation lock
    #[serde(default = "default_monitor_timeout")]
    pub monitor_timeout_secs: u64,
    #[serde(default = "default_shutdown_prefix")]
    pub shutdown_signal_prefix: String,
    /// Expected drain time; shutdown signals are debounced for this long
    #[serde(default = "default_shutdown_debounce")]
    pub shutdown_debounce_secs: u64,
    #[serde(default = "default_vm_init_prefix")]
    pub initiate_vm_worker_prefix: String,
}

fn default_monitor_key() -> String {
    "dm:monitor".to_string()
}

fn default_monitor_timeout() -> u64 {
    55
}

fn default_shutdown_prefix() -> String {
    "dm:shutdown".to_string()
}

fn default_shutdown_debounce() -> u64 {
    30
}

fn default_vm_init_prefix() -> String {
    "dm:vm-init".to_string()
}

/// Folder maintenance thresholds and classification sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceSettings {
    #[serde(default = "default_max_file_count")]
    pub max_file_count_on_folder: usize,
    #[serde(default = "default_max_file_count")]
    pub max_file_count_on_splitted_folder: usize,
    #[serde(default = "default_min_split_count")]
    pub min_file_count_on_splitted_folder: usize,
    /// Directory extensions treated as opaque instrument-vendor units
    #[serde(default = "default_stop_folder_extensions")]
    pub stop_folder_extensions: Vec<String>,
    /// Compressed extensions slated for recompression to zip
    #[serde(default = "default_nonstandard_compressed")]
    pub non_standard_compressed_extensions: Vec<String>,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            max_file_count_on_folder: default_max_file_count(),
            max_file_count_on_splitted_folder: default_max_file_count(),
            min_file_count_on_splitted_folder: default_min_split_count(),
            stop_folder_extensions: default_stop_folder_extensions(),
            non_standard_compressed_extensions: default_nonstandard_compressed(),
        }
    }
}

fn default_max_file_count() -> usize {
    500
}

fn default_min_split_count() -> usize {
    50
}

fn default_stop_folder_extensions() -> Vec<String> {
    [".d", ".raw", ".m", ".pro"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_nonstandard_compressed() -> Vec<String> {
    [
        ".rar", ".7z", ".z", ".g7z", ".arj", ".bz2", ".war", ".tar.gz", ".tgz", ".tar", ".gz",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Root paths of the six study areas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySettings {
    pub metadata_root: PathBuf,
    pub internal_root: PathBuf,
    pub audit_root: PathBuf,
    pub ftp_public_root: PathBuf,
    pub ftp_private_root: PathBuf,
    pub storage_root: PathBuf,
}

/// Daemon loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_tick_interval")]
    pub config_reload_secs: u64,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            config_reload_secs: default_tick_interval(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_tick_interval() -> u64 {
    60
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// The whole configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub cluster: ClusterSettings,
    pub cache: CacheSettings,
    pub workers: WorkerPoolSettings,
    #[serde(default)]
    pub maintenance: MaintenanceSettings,
    pub studies: StudySettings,
    #[serde(default)]
    pub daemon: DaemonSettings,
}

const SECRET_PREFIX: &str = "<secret_file:";

impl Settings {
    /// Load and validate the configuration file, substituting secrets.
    pub fn load(path: &Path, secrets_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut value: serde_yaml_ng::Value = serde_yaml_ng::from_str(&raw)?;
        substitute_secrets(&mut value, secrets_dir)?;
        Ok(serde_yaml_ng::from_value(value)?)
    }
}

fn substitute_secrets(
    value: &mut serde_yaml_ng::Value,
    secrets_dir: Option<&Path>,
) -> Result<(), ConfigError> {
    use serde_yaml_ng::Value;
    match value {
        Value::String(s) => {
            if let Some(name) = s
                .strip_prefix(SECRET_PREFIX)
                .and_then(|rest| rest.strip_suffix('>'))
            {
                let dir = secrets_dir.ok_or(ConfigError::SecretsDirRequired)?;
                let secret_path = dir.join(name);
                let secret = std::fs::read_to_string(&secret_path)
                    .map_err(|_| ConfigError::MissingSecret(secret_path))?;
                *s = secret.trim().to_string();
            }
        }
        Value::Sequence(seq) => {
            for item in seq {
                substitute_secrets(item, secrets_dir)?;
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                substitute_secrets(item, secrets_dir)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
