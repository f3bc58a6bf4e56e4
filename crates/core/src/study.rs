// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Study identity and curation status.
//!
//! A study id is either a public accession (`MTBLS<n>`) or a provisional
//! request id (`REQ<YYYYMMDD><n>`). Everything else is rejected at the
//! boundary so downstream path construction never sees a malformed id.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for public accessions.
pub const ACCESSION_PREFIX: &str = "MTBLS";

/// Prefix for provisional (pre-accession) studies.
pub const PROVISIONAL_PREFIX: &str = "REQ";

/// Error raised when a study id does not match either grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid study id: {0}")]
pub struct StudyIdError(pub String);

/// Validated study identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudyId(String);

impl StudyId {
    /// Parse and validate a study id.
    pub fn parse(raw: &str) -> Result<Self, StudyIdError> {
        let id = raw.trim();
        if let Some(rest) = id.strip_prefix(ACCESSION_PREFIX) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(Self(id.to_string()));
            }
        }
        if let Some(rest) = id.strip_prefix(PROVISIONAL_PREFIX) {
            // Eight date digits followed by at least one sequence digit.
            if rest.len() > 8 && rest.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(Self(id.to_string()));
            }
        }
        Err(StudyIdError(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `REQ…` ids that have not yet been accessioned.
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }
}

impl std::fmt::Display for StudyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StudyId {
    type Error = StudyIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<StudyId> for String {
    fn from(id: StudyId) -> String {
        id.0
    }
}

/// Curation status of a study; drives the per-area writability matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyStatus {
    Submitted,
    InCuration,
    InReview,
    Public,
    Dormant,
}

impl StudyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyStatus::Submitted => "SUBMITTED",
            StudyStatus::InCuration => "IN_CURATION",
            StudyStatus::InReview => "IN_REVIEW",
            StudyStatus::Public => "PUBLIC",
            StudyStatus::Dormant => "DORMANT",
        }
    }
}

/// FTP staging folder name: lowercase study id joined with the per-study
/// obfuscation code so private URLs are not guessable.
pub fn ftp_folder_name(id: &StudyId, obfuscation_code: &str) -> String {
    format!("{}-{}", id.as_str().to_lowercase(), obfuscation_code)
}

#[cfg(test)]
#[path = "study_tests.rs"]
mod tests;
