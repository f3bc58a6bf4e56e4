// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture builders for the spec suite.

use dm_core::{ClusterSettings, WorkerClassSettings, WorkerPoolSettings, WorkloadManagerKind};
use std::path::PathBuf;

pub fn cluster_settings(temp_dir: PathBuf) -> ClusterSettings {
    ClusterSettings {
        host: "hpc.example.org".to_string(),
        user: "dmops".to_string(),
        identity_file: None,
        tunnel_host: None,
        tunnel_user: None,
        workload_manager: WorkloadManagerKind::Slurm,
        job_prefix: "dm".to_string(),
        default_queue: "datamover".to_string(),
        temp_dir,
        deployment_root: PathBuf::from("/apps/dm"),
        account: None,
        submit_timeout_secs: 30,
        kill_timeout_secs: 15,
        list_timeout_secs: 30,
        ping_timeout_secs: 10,
    }
}

pub fn class_settings(min: u32, max_uptime_secs: u64) -> WorkerClassSettings {
    WorkerClassSettings {
        min,
        max: 4,
        max_uptime_secs,
        queue: "datamover".to_string(),
        image_url: "docker://ghcr.io/example/datamover:latest".to_string(),
        bootstrap_command: "/app/bootstrap.sh".to_string(),
        extra_mounts: Vec::new(),
        runtime_limit_secs: 7 * 24 * 3600,
        cpus: 2,
        memory_mb: 8192,
    }
}

pub fn pool_settings(min: u32, max_uptime_secs: u64, monitor_timeout_secs: u64) -> WorkerPoolSettings {
    WorkerPoolSettings {
        datamover: class_settings(min, max_uptime_secs),
        vm: class_settings(0, max_uptime_secs),
        monitor_key_prefix: "dm:monitor".to_string(),
        monitor_timeout_secs,
        shutdown_signal_prefix: "dm:shutdown".to_string(),
        shutdown_debounce_secs: 30,
        initiate_vm_worker_prefix: "dm:vm-init".to_string(),
    }
}
