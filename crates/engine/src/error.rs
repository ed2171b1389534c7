// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use attach_core::VolumeId;
use thiserror::Error;

/// Taxonomy from §7, restricted to the kinds that can actually fail an
/// admission call; stage/notify failures are handled inline by the scan
/// loop (logged and retried next tick) and never surface as a `Result`.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("helper process launch failed: {0}")]
    HelperLaunchFailed(#[source] attach_adapters::SupervisorError),

    #[error("failed to insert attachment for volume {volume_id}: {source}")]
    StoreInsertionFailed {
        volume_id: VolumeId,
        #[source]
        source: attach_core::CoreError,
    },
}

/// Surfaced from `Reconciler::scan_once` back to `run`'s tick loop, which
/// logs and retries rather than propagating further.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("discovery scan failed: {0}")]
    Discovery(#[source] attach_adapters::DiscoveryError),
}
