// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command construction for SSH, SCP and rsync.
//!
//! Builders return a full command line executed through `sh -c`, so every
//! path is quoted here to survive shell expansion.

use std::path::Path;

/// Options applied to every ssh/scp invocation: host keys are not
/// verified (cluster nodes are re-imaged) and ssh's own chatter is
/// silenced so scheduler output can be parsed from stdout.
const SSH_OPTIONS: &str =
    "-o StrictHostKeyChecking=no -o LogLevel=quiet -o UserKnownHostsFile=/dev/null";

/// SSH endpoint, with an optional intermediate hop.
#[derive(Debug, Clone, Default)]
pub struct SshParams {
    pub host: String,
    pub user: Option<String>,
    pub identity_file: Option<String>,
    pub tunnel_host: Option<String>,
    pub tunnel_user: Option<String>,
}

impl SshParams {
    fn hop(user: Option<&str>, host: &str) -> String {
        match user {
            Some(u) => format!("{}@{}", u, host),
            None => host.to_string(),
        }
    }
}

/// Quote a string for `sh -c` when it contains anything the shell could
/// expand.
pub fn quote(s: &str) -> String {
    let safe = s
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'/' | b':' | b'@' | b'='));
    if safe && !s.is_empty() {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

fn quote_path(p: &Path) -> String {
    quote(&p.to_string_lossy())
}

/// Build the SSH command prefix for the given endpoint.
///
/// With a tunnel, two invocations are chained: the remote command is
/// carried as the argument of the inner `ssh` run on the tunnel host.
pub fn build_ssh(params: &SshParams) -> String {
    let identity = params
        .identity_file
        .as_deref()
        .map(|f| format!(" -i {}", quote(f)))
        .unwrap_or_default();
    let target = SshParams::hop(params.user.as_deref(), &params.host);
    match &params.tunnel_host {
        Some(tunnel) => {
            let tunnel_target = SshParams::hop(params.tunnel_user.as_deref(), tunnel);
            format!(
                "ssh {SSH_OPTIONS}{identity} {tunnel_target} ssh {SSH_OPTIONS} {target}"
            )
        }
        None => format!("ssh {SSH_OPTIONS}{identity} {target}"),
    }
}

/// Build an `scp` command line.
pub fn build_scp(source: &Path, target: &str, identity_file: Option<&str>, recursive: bool) -> String {
    let identity = identity_file
        .map(|f| format!(" -i {}", quote(f)))
        .unwrap_or_default();
    let r = if recursive { " -r" } else { "" };
    format!(
        "scp {SSH_OPTIONS}{identity}{r} {} {}",
        quote_path(source),
        quote(target)
    )
}

/// rsync invocation parameters.
#[derive(Debug, Clone, Default)]
pub struct RsyncParams {
    pub source: String,
    pub target: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    /// Mode flags, e.g. `-aunv` for a dry run
    pub extra_args: String,
    pub identity_file: Option<String>,
}

/// Build an `rsync` command line.
///
/// Include rules come before exclude rules so includes can punch holes in
/// a broad exclusion. An identity file implies a remote endpoint and adds
/// the `-e ssh` transport.
pub fn build_rsync(params: &RsyncParams) -> String {
    let mut cmd = format!("rsync {}", params.extra_args);
    for inc in &params.includes {
        cmd.push_str(&format!(" --include={}", quote(inc)));
    }
    for exc in &params.excludes {
        cmd.push_str(&format!(" --exclude={}", quote(exc)));
    }
    if let Some(identity) = &params.identity_file {
        cmd.push_str(&format!(" -e \"ssh {SSH_OPTIONS} -i {}\"", quote(identity)));
    }
    cmd.push_str(&format!(" {} {}", quote(&params.source), quote(&params.target)));
    cmd
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
