// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{NodeStageRequest, StageClient, StageError};

/// Scriptable stage client: each call to `node_stage` consumes the next
/// scripted outcome (default `Ok`), and every request is recorded for
/// assertions (S3's "identical arguments on retry" check).
#[derive(Default)]
pub struct FakeStageClient {
    script: Mutex<Vec<Result<(), StageError>>>,
    calls: Mutex<Vec<NodeStageRequest>>,
}

impl FakeStageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, result: Result<(), StageError>) {
        self.script.lock().push(result);
    }

    pub fn calls(&self) -> Vec<NodeStageRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StageClient for FakeStageClient {
    async fn node_stage(
        &self,
        request: NodeStageRequest,
        _cancellation: CancellationToken,
    ) -> Result<(), StageError> {
        self.calls.lock().push(request);
        let mut script = self.script.lock();
        if script.is_empty() {
            Ok(())
        } else {
            script.remove(0)
        }
    }
}
