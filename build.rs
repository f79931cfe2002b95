// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Packagers can pin the version without a git checkout
    let version = if let Ok(v) = std::env::var("ISP_PIPELINE_VERSION") {
        v
    } else {
        get_git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `git describe` output without the leading `v`, e.g. "0.1.0-5-gabcdef1".
fn get_git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let version = version.strip_prefix('v').unwrap_or(&version).to_string();
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}
