// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-study on-disk layout.
//!
//! A study is spread across six logical areas, each rooted at a configured
//! path. The per-study sub-path is the study id itself, except in the FTP
//! staging areas where it carries the obfuscation code.

use crate::config::StudySettings;
use crate::study::{ftp_folder_name, StudyId, StudyStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logical file areas of a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyArea {
    /// ISA-Tab metadata files (read/write)
    Metadata,
    /// Logs and task outputs (read/write)
    Internal,
    /// Audit snapshots (read/write)
    Audit,
    /// Public FTP upload staging
    FtpPublic,
    /// Private FTP upload staging
    FtpPrivate,
    /// Promoted artifacts (read-only storage)
    Storage,
}

impl StudyArea {
    pub const ALL: [StudyArea; 6] = [
        StudyArea::Metadata,
        StudyArea::Internal,
        StudyArea::Audit,
        StudyArea::FtpPublic,
        StudyArea::FtpPrivate,
        StudyArea::Storage,
    ];
}

/// Resolves area paths for one study.
#[derive(Debug, Clone)]
pub struct StudyLayout {
    id: StudyId,
    obfuscation_code: String,
    roots: StudySettings,
}

impl StudyLayout {
    pub fn new(id: StudyId, obfuscation_code: impl Into<String>, roots: StudySettings) -> Self {
        Self {
            id,
            obfuscation_code: obfuscation_code.into(),
            roots,
        }
    }

    pub fn study_id(&self) -> &StudyId {
        &self.id
    }

    /// Absolute path of one area for this study.
    pub fn path(&self, area: StudyArea) -> PathBuf {
        let root = match area {
            StudyArea::Metadata => &self.roots.metadata_root,
            StudyArea::Internal => &self.roots.internal_root,
            StudyArea::Audit => &self.roots.audit_root,
            StudyArea::FtpPublic => &self.roots.ftp_public_root,
            StudyArea::FtpPrivate => &self.roots.ftp_private_root,
            StudyArea::Storage => &self.roots.storage_root,
        };
        root.join(self.sub_path(area))
    }

    /// Per-study directory name inside an area root.
    pub fn sub_path(&self, area: StudyArea) -> String {
        match area {
            StudyArea::FtpPublic | StudyArea::FtpPrivate => {
                ftp_folder_name(&self.id, &self.obfuscation_code)
            }
            _ => self.id.as_str().to_string(),
        }
    }

    /// Whether an area accepts writes for a study in the given status.
    ///
    /// Storage is always read-only. Metadata freezes once the study is
    /// public or dormant, and the private FTP staging closes at the same
    /// point.
    pub fn is_writable(area: StudyArea, status: StudyStatus) -> bool {
        let frozen = matches!(status, StudyStatus::Public | StudyStatus::Dormant);
        match area {
            StudyArea::Storage => false,
            StudyArea::Metadata | StudyArea::FtpPrivate => !frozen,
            StudyArea::Internal | StudyArea::Audit | StudyArea::FtpPublic => true,
        }
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
