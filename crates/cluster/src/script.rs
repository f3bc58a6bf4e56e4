// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission script assembly shared by both workload managers.

use crate::ClusterError;
use std::path::{Path, PathBuf};

/// Combine a scheduler directive preamble with a user script.
///
/// The user script's own shebang is stripped so the preamble sits
/// directly under ours.
pub fn assemble(directives: &[String], user_script: &str) -> String {
    let body = user_script
        .strip_prefix("#!")
        .map(|rest| rest.split_once('\n').map(|(_, tail)| tail).unwrap_or(""))
        .unwrap_or(user_script);

    let mut script = String::from("#!/bin/bash\n");
    for d in directives {
        script.push_str(d);
        script.push('\n');
    }
    script.push('\n');
    script.push_str(body);
    if !script.ends_with('\n') {
        script.push('\n');
    }
    script
}

/// Write an assembled script under the configured temp directory with a
/// unique name, returning its path.
pub async fn write_script(
    temp_dir: &Path,
    job_name: &str,
    content: &str,
) -> Result<PathBuf, ClusterError> {
    let path = temp_dir.join(format!("{}-{}.sh", job_name, uuid::Uuid::new_v4()));
    let to_err = |source| ClusterError::Script {
        path: path.clone(),
        source,
    };
    tokio::fs::create_dir_all(temp_dir).await.map_err(to_err)?;
    tokio::fs::write(&path, content).await.map_err(to_err)?;
    Ok(path)
}

/// `HH:MM` (LSF style).
pub fn runtime_limit_hh_mm(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 3600, (secs % 3600) / 60)
}

/// `HH:MM:SS` (Slurm style).
pub fn runtime_limit_hh_mm_ss(secs: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
