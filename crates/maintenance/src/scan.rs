// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Study tree scanning.
//!
//! Produces the flat descriptor list the planner operates on. Stop
//! folders (instrument-vendor directories such as `acquisition.d`) are
//! recorded but never descended into; they are compressed as a unit.

use crate::MaintenanceError;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// One discovered file or directory, relative to the study root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// `/`-separated path relative to the scanned root
    pub rel_path: String,
    pub size_bytes: u64,
    /// Epoch seconds; 0 when the filesystem reports no usable timestamp
    pub modified_epoch: u64,
    pub is_directory: bool,
    pub is_empty: bool,
    pub is_stop_folder: bool,
}

/// Walk `root` and describe every entry below it.
pub fn scan(
    root: &Path,
    stop_folder_extensions: &[String],
) -> Result<Vec<FileDescriptor>, MaintenanceError> {
    let mut descriptors = Vec::new();
    let mut walker = walkdir::WalkDir::new(root).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|error| {
            let path = error.path().unwrap_or(root).to_path_buf();
            MaintenanceError::Io {
                path: path.clone(),
                source: error
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk error")),
            }
        })?;
        if entry.path() == root {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let metadata = entry.metadata().map_err(|error| MaintenanceError::Io {
            path: entry.path().to_path_buf(),
            source: error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("metadata error")),
        })?;
        let modified_epoch = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let is_directory = metadata.is_dir();
        let is_stop_folder = is_directory && is_stop_folder(&rel_path, stop_folder_extensions);
        let is_empty = is_directory && dir_is_empty(entry.path());
        descriptors.push(FileDescriptor {
            rel_path,
            size_bytes: if is_directory { 0 } else { metadata.len() },
            modified_epoch,
            is_directory,
            is_empty,
            is_stop_folder,
        });

        if is_stop_folder {
            walker.skip_current_dir();
        }
    }
    Ok(descriptors)
}

fn is_stop_folder(rel_path: &str, extensions: &[String]) -> bool {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let lower = name.to_lowercase();
    extensions
        .iter()
        .any(|ext| lower.ends_with(&ext.to_lowercase()))
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
