// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{AttachmentArn, ClusterArn, ContainerInstanceArn, VolumeId};

/// Well-known property keys carried in an announcement's `properties` map.
pub mod property_keys {
    pub const VOLUME_ID: &str = "volume_id";
    pub const SOURCE_HOST_PATH: &str = "source_host_path";
    pub const FILESYSTEM_TYPE: &str = "filesystem_type";
    pub const DEVICE_NAME: &str = "device_name";
}

/// Only `TaskAttachBlockStorage` is honored; any other announced type is
/// dropped with a warning at the admission boundary (§4.F admission, kind
/// "unsupported attachment type").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentType {
    TaskAttachBlockStorage,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStatus {
    Pending,
    Attached,
}

/// The central per-volume record. Mutated only by the admission path
/// (timer arming) and the reconciler (device name, status, sent, timer
/// disarming) — see invariants in attachment.rs module docs upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub volume_id: VolumeId,
    pub attachment_arn: AttachmentArn,
    pub cluster_arn: ClusterArn,
    pub container_instance_arn: ContainerInstanceArn,
    pub attachment_type: AttachmentType,
    pub properties: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
    status: AttachmentStatus,
    sent: bool,
    /// Bookkeeping only: the actual one-shot timer task lives outside this
    /// crate (attach-engine's ack-timer registry). This flag lets the
    /// invariant "armed exactly once, disarmed on send" be asserted here
    /// without this crate depending on an async runtime.
    timer_armed: bool,
}

impl Attachment {
    pub fn new(
        volume_id: VolumeId,
        attachment_arn: AttachmentArn,
        cluster_arn: ClusterArn,
        container_instance_arn: ContainerInstanceArn,
        attachment_type: AttachmentType,
        properties: HashMap<String, String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            volume_id,
            attachment_arn,
            cluster_arn,
            container_instance_arn,
            attachment_type,
            properties,
            expires_at,
            status: AttachmentStatus::Pending,
            sent: false,
            timer_armed: false,
        }
    }

    pub fn source_host_path(&self) -> Option<&str> {
        self.properties
            .get(property_keys::SOURCE_HOST_PATH)
            .map(String::as_str)
    }

    pub fn filesystem_type(&self) -> Option<&str> {
        self.properties
            .get(property_keys::FILESYSTEM_TYPE)
            .map(String::as_str)
    }

    pub fn device_name(&self) -> Option<&str> {
        self.properties
            .get(property_keys::DEVICE_NAME)
            .map(String::as_str)
    }

    /// Invariant 3: device_name is non-empty iff discovery has observed
    /// this volume at least once.
    pub fn set_device_name(&mut self, device_name: impl Into<String>) {
        self.properties
            .insert(property_keys::DEVICE_NAME.to_string(), device_name.into());
    }

    /// `/mnt/ecs/ebs/<basename(source_host_path)>`, per §6.
    pub fn target_path(&self, mount_root: &str) -> Option<PathBuf> {
        let source = self.source_host_path()?;
        let basename = source.rsplit('/').next().unwrap_or(source);
        Some(PathBuf::from(mount_root).join(basename))
    }

    /// Idempotent: arming an already-armed timer is a no-op (invariant 5,
    /// and §7's "duplicate admission" policy). Returns whether this call
    /// actually transitioned the flag (the caller uses this to decide
    /// whether to actually spawn a new timer task or just confirm one is
    /// already running).
    pub fn mark_timer_armed(&mut self) -> bool {
        if self.timer_armed {
            false
        } else {
            self.timer_armed = true;
            true
        }
    }

    pub fn mark_timer_disarmed(&mut self) {
        self.timer_armed = false;
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn mark_attached(&mut self) {
        self.status = AttachmentStatus::Attached;
    }

    /// Precondition: status is `Attached` (§4.A). Violating this is a
    /// caller bug, not a runtime condition — the reconciler never calls
    /// this before `mark_attached`.
    pub fn mark_sent(&mut self) -> Result<(), CoreError> {
        if self.status != AttachmentStatus::Attached {
            return Err(CoreError::NotAttached {
                volume_id: self.volume_id.clone(),
            });
        }
        self.sent = true;
        self.timer_armed = false;
        Ok(())
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn is_attached(&self) -> bool {
        self.status == AttachmentStatus::Attached
    }

    pub fn status(&self) -> AttachmentStatus {
        self.status
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
#[path = "attachment_tests.rs"]
mod tests;
