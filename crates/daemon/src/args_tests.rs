// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parse(argv: &[&str]) -> Result<Args, ArgsError> {
    Args::parse(argv.iter().map(|s| s.to_string()))
}

#[test]
fn config_and_secrets_are_accepted() {
    let args = parse(&["--config", "/etc/dm/config.yaml", "--secrets", "/etc/dm/keys"]).unwrap();
    assert_eq!(args.config, PathBuf::from("/etc/dm/config.yaml"));
    assert_eq!(args.secrets, PathBuf::from("/etc/dm/keys"));
}

#[test]
fn secrets_default_to_a_sibling_of_the_config() {
    let args = parse(&["--config", "/etc/dm/config.yaml"]).unwrap();
    assert_eq!(args.secrets, PathBuf::from("/etc/dm/.secrets"));
}

#[test]
fn config_is_required() {
    assert_eq!(parse(&[]), Err(ArgsError::MissingConfig));
}

#[test]
fn a_flag_without_a_value_is_rejected() {
    assert_eq!(
        parse(&["--config"]),
        Err(ArgsError::MissingValue("--config".to_string()))
    );
}

#[test]
fn unknown_arguments_are_rejected() {
    assert_eq!(
        parse(&["--config", "c.yaml", "--verbose"]),
        Err(ArgsError::Unexpected("--verbose".to_string()))
    );
}
