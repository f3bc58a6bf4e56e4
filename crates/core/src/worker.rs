// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker classes and identity grammar.
//!
//! A worker's scheduler job name is `<prefix>-<class>_<identifier>`; its
//! broker registration is `<job_name>@<host>`. Slurm has no project
//! filter, so the job prefix is additionally embedded into Slurm job
//! names with [`PROJECT_DELIMITER`] and recovered by grepping the queue
//! listing.

use serde::{Deserialize, Serialize};

/// Delimiter between prefix and class inside a worker job name.
pub const CLASS_DELIMITER: &str = "-";

/// Delimiter between the project prefix and the job name in Slurm job
/// names (squeue cannot filter by project).
pub const PROJECT_DELIMITER: &str = "---";

/// Worker deployment classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerClass {
    Compute,
    Datamover,
    Vm,
}

impl WorkerClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerClass::Compute => "compute",
            WorkerClass::Datamover => "datamover",
            WorkerClass::Vm => "vm",
        }
    }
}

impl std::fmt::Display for WorkerClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed worker identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub prefix: String,
    pub class: WorkerClass,
    pub identifier: String,
}

impl WorkerIdentity {
    pub fn new(prefix: impl Into<String>, class: WorkerClass, identifier: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            class,
            identifier: identifier.into(),
        }
    }

    /// Scheduler job name: `<prefix>-<class>_<identifier>`.
    pub fn job_name(&self) -> String {
        format!(
            "{}{}{}_{}",
            self.prefix, CLASS_DELIMITER, self.class, self.identifier
        )
    }

    /// Job-name prefix shared by every worker of a class.
    pub fn class_prefix(prefix: &str, class: WorkerClass) -> String {
        format!("{}{}{}", prefix, CLASS_DELIMITER, class)
    }

    /// Broker registration name: `<job_name>@<host>`.
    pub fn registration_name(&self, host: &str) -> String {
        format!("{}@{}", self.job_name(), host)
    }

    /// Parse a job name or broker registration back into an identity.
    ///
    /// `None` when the name does not carry the expected prefix, class, or
    /// identifier segments.
    pub fn parse(name: &str, prefix: &str) -> Option<Self> {
        // Drop a trailing "@host" from broker registrations.
        let name = name.split('@').next()?;
        let rest = name.strip_prefix(prefix)?.strip_prefix(CLASS_DELIMITER)?;
        let (class_str, identifier) = rest.split_once('_')?;
        let class = match class_str {
            "compute" => WorkerClass::Compute,
            "datamover" => WorkerClass::Datamover,
            "vm" => WorkerClass::Vm,
            _ => return None,
        };
        if identifier.is_empty() {
            return None;
        }
        Some(Self::new(prefix, class, identifier))
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
