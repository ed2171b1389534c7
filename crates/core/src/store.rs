// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::attachment::{Attachment, AttachmentStatus};
use crate::error::CoreError;
use crate::id::VolumeId;

/// The only shared mutable state in the controller (§5). All operations
/// serialize through a single mutex; individual attachment mutation goes
/// through `mutate` so admission, the reconciler, and timer callbacks never
/// race on a single record's fields.
#[derive(Default)]
pub struct AttachmentStore {
    inner: Mutex<HashMap<VolumeId, Attachment>>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects duplicates (invariant 1). Admission should check
    /// `contains` first when it needs to distinguish "already known" (for
    /// idempotent re-arm) from a genuine insert.
    pub fn add(&self, attachment: Attachment) -> Result<(), CoreError> {
        let mut guard = self.inner.lock();
        if guard.contains_key(&attachment.volume_id) {
            return Err(CoreError::DuplicateVolume {
                volume_id: attachment.volume_id,
            });
        }
        guard.insert(attachment.volume_id.clone(), attachment);
        Ok(())
    }

    pub fn contains(&self, volume_id: &VolumeId) -> bool {
        self.inner.lock().contains_key(volume_id)
    }

    pub fn get(&self, volume_id: &VolumeId) -> Option<Attachment> {
        self.inner.lock().get(volume_id).cloned()
    }

    /// Idempotent; removing an unknown volume is a no-op.
    pub fn remove(&self, volume_id: &VolumeId) -> Option<Attachment> {
        self.inner.lock().remove(volume_id)
    }

    /// Apply `f` to the stored record in place, while holding the store
    /// lock for the duration of the closure. Closures passed here must be
    /// short and non-blocking.
    pub fn mutate<R>(
        &self,
        volume_id: &VolumeId,
        f: impl FnOnce(&mut Attachment) -> R,
    ) -> Result<R, CoreError> {
        let mut guard = self.inner.lock();
        let attachment = guard.get_mut(volume_id).ok_or_else(|| CoreError::NotFound {
            volume_id: volume_id.clone(),
        })?;
        Ok(f(attachment))
    }

    /// Enumerates attachments with status `Pending` that have not expired.
    /// Ordering is not meaningful (§4.B).
    pub fn pending(&self, now: DateTime<Utc>) -> Vec<Attachment> {
        self.inner
            .lock()
            .values()
            .filter(|a| a.status() == AttachmentStatus::Pending && !a.has_expired(now))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
