// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Resolve state directory: ATTACHD_STATE_DIR > XDG_STATE_HOME/attachd > ~/.local/state/attachd
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ATTACHD_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("attachd");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".local/state/attachd")
}

/// Scan period override (§10.3).
pub fn scan_period() -> Duration {
    std::env::var("ATTACHD_SCAN_PERIOD_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(1))
}

/// Per-call ceiling on the stage RPC. Defaults to the original watcher's
/// actually-executed constant of 2s, not its stale "capped to 30s"
/// comment (§9 open question 2, SPEC_FULL.md §10.3).
pub fn node_stage_timeout() -> Duration {
    std::env::var("ATTACHD_NODE_STAGE_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(2))
}

pub fn csi_socket_path() -> PathBuf {
    std::env::var("ATTACHD_CSI_SOCKET_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/run/ecs/ebs-csi-driver/csi-driver.sock"))
}

pub fn mount_root() -> String {
    std::env::var("ATTACHD_MOUNT_ROOT").unwrap_or_else(|_| "/mnt/ecs/ebs".to_string())
}

pub fn ingest_socket_path() -> PathBuf {
    std::env::var("ATTACHD_INGEST_SOCKET_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join("announce.sock"))
}

pub fn csi_helper_binary_path() -> PathBuf {
    std::env::var("ATTACHD_CSI_HELPER_BINARY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/usr/libexec/ebs-csi-driver"))
}

pub fn discovery_scan_root() -> PathBuf {
    std::env::var("ATTACHD_DISCOVERY_SCAN_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/dev/disk/by-ecs-volume-id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(env)]
    fn node_stage_timeout_defaults_to_two_seconds() {
        std::env::remove_var("ATTACHD_NODE_STAGE_TIMEOUT_MS");
        assert_eq!(node_stage_timeout(), Duration::from_secs(2));
    }

    #[test]
    #[serial(env)]
    fn node_stage_timeout_honors_override() {
        std::env::set_var("ATTACHD_NODE_STAGE_TIMEOUT_MS", "500");
        assert_eq!(node_stage_timeout(), Duration::from_millis(500));
        std::env::remove_var("ATTACHD_NODE_STAGE_TIMEOUT_MS");
    }

    #[test]
    #[serial(env)]
    fn mount_root_defaults_to_ecs_convention() {
        std::env::remove_var("ATTACHD_MOUNT_ROOT");
        assert_eq!(mount_root(), "/mnt/ecs/ebs");
    }
}
