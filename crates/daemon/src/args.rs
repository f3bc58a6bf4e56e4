// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line arguments.
//!
//! Two flags only, so no argument-parsing dependency: `--config` is
//! required, `--secrets` defaults to `.secrets` next to the config file.

use std::path::PathBuf;
use thiserror::Error;

pub const USAGE: &str = "Usage: dmd --config <path> [--secrets <dir>]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("missing value for '{0}'")]
    MissingValue(String),
    #[error("unexpected argument '{0}'")]
    Unexpected(String),
    #[error("--config is required")]
    MissingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub config: PathBuf,
    pub secrets: PathBuf,
}

impl Args {
    pub fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut argv = argv.into_iter();
        let mut config: Option<PathBuf> = None;
        let mut secrets: Option<PathBuf> = None;
        while let Some(arg) = argv.next() {
            match arg.as_str() {
                "--config" => {
                    let value = argv.next().ok_or(ArgsError::MissingValue(arg))?;
                    config = Some(PathBuf::from(value));
                }
                "--secrets" => {
                    let value = argv.next().ok_or(ArgsError::MissingValue(arg))?;
                    secrets = Some(PathBuf::from(value));
                }
                _ => return Err(ArgsError::Unexpected(arg)),
            }
        }
        let config = config.ok_or(ArgsError::MissingConfig)?;
        let secrets = secrets.unwrap_or_else(|| {
            config
                .parent()
                .map(|dir| dir.join(".secrets"))
                .unwrap_or_else(|| PathBuf::from(".secrets"))
        });
        Ok(Self { config, secrets })
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
