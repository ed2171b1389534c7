// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use attach_core::VolumeId;
use tracing::warn;

use super::{DiscoveryAdapter, DiscoveryError};

/// Scans a directory of per-volume device hints, one entry per volume id
/// (a symlink or regular file named after the volume id whose target/
/// contents is the device path) — the on-host equivalent of udev's
/// `/dev/disk/by-id` naming scheme, without pulling in a udev binding for
/// a single lookup. A partial failure (permission error, missing hint)
/// for one volume does not fail the whole scan (§4.C).
pub struct HostDiscoveryAdapter {
    scan_root: PathBuf,
}

impl HostDiscoveryAdapter {
    pub fn new(scan_root: impl Into<PathBuf>) -> Self {
        Self {
            scan_root: scan_root.into(),
        }
    }
}

#[async_trait]
impl DiscoveryAdapter for HostDiscoveryAdapter {
    async fn discover(
        &self,
        pending: &[VolumeId],
    ) -> Result<HashMap<VolumeId, String>, DiscoveryError> {
        let mut found = HashMap::new();
        for volume_id in pending {
            let hint_path = self.scan_root.join(volume_id.as_str());
            match tokio::fs::read_link(&hint_path).await {
                Ok(target) => {
                    found.insert(volume_id.clone(), target.to_string_lossy().into_owned());
                }
                Err(_) => match tokio::fs::canonicalize(&hint_path).await {
                    Ok(target) => {
                        found.insert(volume_id.clone(), target.to_string_lossy().into_owned());
                    }
                    Err(_) => {
                        warn!(%volume_id, "volume not yet present on host, will retry next tick");
                    }
                },
            }
        }
        Ok(found)
    }
}
