// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

fn minimal_yaml() -> String {
    r#"
cluster:
  host: codon-login
  user: datamover
  identity_file: /home/dm/.ssh/id_rsa
  workload_manager: slurm
  job_prefix: metab
  default_queue: datamover
  temp_dir: /tmp/dm
  deployment_root: /hps/software/dm
cache:
  redis_url: "redis://cache:6379/0"
workers:
  datamover:
    min: 2
    max: 5
    max_uptime_secs: 86400
    queue: datamover
    image_url: "docker://example/datamover:latest"
    bootstrap_command: "worker-entrypoint.sh"
  vm:
    min: 1
    max: 2
    max_uptime_secs: 86400
    queue: vm
    image_url: "docker://example/vm:latest"
    bootstrap_command: "worker-entrypoint.sh"
studies:
  metadata_root: /data/metadata
  internal_root: /data/internal
  audit_root: /data/audit
  ftp_public_root: /ftp/public
  ftp_private_root: /ftp/private
  storage_root: /storage
"#
    .to_string()
}

fn write_config(dir: &std::path::Path, yaml: &str) -> std::path::PathBuf {
    let path = dir.join("config.yaml");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(yaml.as_bytes()).unwrap();
    path
}

#[test]
fn loads_minimal_config_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), &minimal_yaml());

    let settings = Settings::load(&path, None).unwrap();
    assert_eq!(settings.cluster.workload_manager, WorkloadManagerKind::Slurm);
    assert_eq!(settings.cluster.submit_timeout_secs, 30);
    assert_eq!(settings.cluster.kill_timeout_secs, 15);
    assert_eq!(settings.cache.default_ttl_secs, 3600);
    assert_eq!(settings.workers.monitor_timeout_secs, 55);
    assert_eq!(settings.workers.shutdown_debounce_secs, 30);
    assert_eq!(settings.maintenance.max_file_count_on_folder, 500);
    assert_eq!(settings.maintenance.min_file_count_on_splitted_folder, 50);
    assert_eq!(settings.daemon.tick_interval_secs, 60);
}

#[test]
fn substitutes_secret_file_references() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(".secrets")).unwrap();
    std::fs::write(dir.path().join(".secrets/redis_url"), "redis://secret:6379/1\n").unwrap();

    let yaml = minimal_yaml().replace(
        "\"redis://cache:6379/0\"",
        "\"<secret_file:redis_url>\"",
    );
    let path = write_config(dir.path(), &yaml);

    let settings = Settings::load(&path, Some(&dir.path().join(".secrets"))).unwrap();
    assert_eq!(settings.cache.redis_url, "redis://secret:6379/1");
}

#[test]
fn missing_secret_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(".secrets")).unwrap();
    let yaml = minimal_yaml().replace(
        "\"redis://cache:6379/0\"",
        "\"<secret_file:nope>\"",
    );
    let path = write_config(dir.path(), &yaml);

    let err = Settings::load(&path, Some(&dir.path().join(".secrets"))).unwrap_err();
    assert!(matches!(err, ConfigError::MissingSecret(_)));
}

#[test]
fn secret_reference_without_secrets_dir_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = minimal_yaml().replace(
        "\"redis://cache:6379/0\"",
        "\"<secret_file:redis_url>\"",
    );
    let path = write_config(dir.path(), &yaml);

    let err = Settings::load(&path, None).unwrap_err();
    assert!(matches!(err, ConfigError::SecretsDirRequired));
}

#[test]
fn unreadable_file_reports_io_error() {
    let err = Settings::load(std::path::Path::new("/nonexistent/config.yaml"), None).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
