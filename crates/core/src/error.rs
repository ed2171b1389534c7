// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::id::VolumeId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("volume {volume_id} already has an attachment record")]
    DuplicateVolume { volume_id: VolumeId },

    #[error("no attachment record for volume {volume_id}")]
    NotFound { volume_id: VolumeId },

    #[error("attachment {volume_id} is not attached; mark_attached must run first")]
    NotAttached { volume_id: VolumeId },
}
