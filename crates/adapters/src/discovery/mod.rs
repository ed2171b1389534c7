// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use async_trait::async_trait;
use attach_core::VolumeId;
use thiserror::Error;

mod host;
#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use host::HostDiscoveryAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDiscoveryAdapter;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery scan failed: {0}")]
    ScanFailed(String),
}

/// Given the set of pending volume ids, returns the subset currently
/// present as host block devices, mapped to the discovered device path
/// (§4.C). Implementations must never fabricate a path for a volume they
/// have not physically observed, and must never return a volume outside
/// the requested set.
#[async_trait]
pub trait DiscoveryAdapter: Send + Sync + 'static {
    async fn discover(
        &self,
        pending: &[VolumeId],
    ) -> Result<HashMap<VolumeId, String>, DiscoveryError>;
}
