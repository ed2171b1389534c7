// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use attach_core::VolumeId;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

mod grpc;
#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use grpc::GrpcStageClient;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeStageClient;

/// Access mode is fixed to read-write-many for every call (§4.D); this
/// type exists only so the request struct is self-describing rather than
/// carrying a bare bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    ReadWriteMany,
}

#[derive(Debug, Clone)]
pub struct NodeStageRequest {
    pub volume_id: VolumeId,
    pub publish_context: HashMap<String, String>,
    pub target_path: String,
    pub fs_type: String,
    pub access_mode: AccessMode,
    pub secrets: HashMap<String, String>,
    pub volume_context: HashMap<String, String>,
    pub mount_options: Vec<String>,
    pub fs_group: i64,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("node_stage call timed out after {0:?}")]
    Timeout(Duration),
    #[error("node_stage call cancelled")]
    Cancelled,
    #[error("node_stage rpc failed: {0}")]
    Rpc(String),
}

/// Single operation: stage a discovered volume through the node-level
/// storage driver (§4.D). Errors are transient from the caller's
/// perspective — the reconciler retries on the next tick. `cancellation`
/// is a child of the reconciler's root token; cancelling it aborts the
/// in-flight call independent of the per-call timeout.
#[async_trait]
pub trait StageClient: Send + Sync + 'static {
    async fn node_stage(
        &self,
        request: NodeStageRequest,
        cancellation: CancellationToken,
    ) -> Result<(), StageError>;
}
