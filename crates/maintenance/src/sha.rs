// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hash bookkeeping for the content summary.
//!
//! The study's `sha_256_values.tsv` index maps file paths to previously
//! computed digests. Metadata files are always re-hashed; data files are
//! hashed only when absent from the index.

use crate::plan::{ActionKind, ActionLogEntry, MaintenancePlan};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

pub const HASH_INDEX_FILE: &str = "sha_256_values.tsv";

/// Pre-loaded `path → sha256` index.
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    entries: HashMap<String, String>,
}

impl HashIndex {
    /// Load the index; a missing file is an empty index, not an error.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter_map(|line| {
                let (path, hash) = line.split_once('\t')?;
                let hash = hash.trim();
                (!hash.is_empty()).then(|| (path.trim().to_string(), hash.to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}

/// Hash a file's contents; used when the plan is applied.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// ISA-Tab metadata filename prefixes. MAF tables come as `.txt` or
/// `.tsv`; the other metadata files are always `.txt`.
pub fn is_metadata_file(planned_path: &str) -> bool {
    let name = planned_path.rsplit('/').next().unwrap_or(planned_path);
    let prefixed = ["i_", "s_", "a_", "m_"]
        .iter()
        .any(|prefix| name.starts_with(prefix));
    (prefixed && name.ends_with(".txt")) || (name.starts_with("m_") && name.ends_with(".tsv"))
}

/// Pass 10: schedule digests for metadata files and unindexed data files.
pub fn schedule_hashes(plan: &mut MaintenancePlan, index: &HashIndex) {
    let live: Vec<(String, String)> = plan
        .entries
        .iter()
        .filter(|(_, planned)| !planned.is_empty())
        .map(|(scanned, planned)| (scanned.clone(), planned.clone()))
        .collect();
    for (scanned, planned) in live {
        let descriptor = plan.files.get(&scanned);
        if descriptor.is_some_and(|f| f.is_directory) {
            continue;
        }
        if is_metadata_file(&planned) || !index.contains(&planned) {
            plan.actions
                .push(ActionLogEntry::new(ActionKind::CalculateSha256, &planned, "").at(&scanned));
        }
    }
}

#[cfg(test)]
#[path = "sha_tests.rs"]
mod tests;
