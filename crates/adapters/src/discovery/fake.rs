// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use async_trait::async_trait;
use attach_core::VolumeId;
use parking_lot::Mutex;

use super::{DiscoveryAdapter, DiscoveryError};

/// Scriptable discovery result for tests: call `push_result` once per
/// expected tick; each call to `discover` pops the next scripted map
/// (or returns empty if the script is exhausted, matching a "not found
/// yet" tick).
#[derive(Default)]
pub struct FakeDiscoveryAdapter {
    script: Mutex<Vec<HashMap<VolumeId, String>>>,
    calls: Mutex<Vec<Vec<VolumeId>>>,
}

impl FakeDiscoveryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, result: HashMap<VolumeId, String>) {
        self.script.lock().push(result);
    }

    pub fn calls(&self) -> Vec<Vec<VolumeId>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl DiscoveryAdapter for FakeDiscoveryAdapter {
    async fn discover(
        &self,
        pending: &[VolumeId],
    ) -> Result<HashMap<VolumeId, String>, DiscoveryError> {
        self.calls.lock().push(pending.to_vec());
        let mut script = self.script.lock();
        if script.is_empty() {
            Ok(HashMap::new())
        } else {
            Ok(script.remove(0))
        }
    }
}
