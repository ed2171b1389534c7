// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::{property_keys, Attachment, AttachmentType};
use crate::id::{AttachmentArn, ClusterArn, ContainerInstanceArn, VolumeId};

/// Wire shape of an inbound attachment announcement (§6). Construction
/// from this into an `Attachment` is the only place the required-keys
/// invariant is checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub attachment_type: AttachmentType,
    pub attachment_arn: String,
    pub cluster_arn: String,
    pub container_instance_arn: String,
    pub properties: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnnouncementError {
    #[error("missing required property {0:?}")]
    MissingProperty(&'static str),
}

impl Announcement {
    pub fn volume_id(&self) -> Option<&str> {
        self.properties.get(property_keys::VOLUME_ID).map(String::as_str)
    }

    /// Builds the store-ready `Attachment`. Callers (attach-engine's
    /// admission entry point) are expected to have already rejected
    /// `AttachmentType::Unsupported` before calling this.
    pub fn into_attachment(self) -> Result<Attachment, AnnouncementError> {
        for key in [
            property_keys::VOLUME_ID,
            property_keys::SOURCE_HOST_PATH,
            property_keys::FILESYSTEM_TYPE,
        ] {
            if !self.properties.contains_key(key) {
                return Err(AnnouncementError::MissingProperty(key));
            }
        }
        let volume_id = VolumeId::new(self.properties[property_keys::VOLUME_ID].clone());
        Ok(Attachment::new(
            volume_id,
            AttachmentArn::new(self.attachment_arn),
            ClusterArn::new(self.cluster_arn),
            ContainerInstanceArn::new(self.container_instance_arn),
            self.attachment_type,
            self.properties,
            self.expires_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn rejects_missing_required_property() {
        let a = Announcement {
            attachment_type: AttachmentType::TaskAttachBlockStorage,
            attachment_arn: "arn:a".into(),
            cluster_arn: "arn:c".into(),
            container_instance_arn: "arn:ci".into(),
            properties: props(&[("volume_id", "v1")]),
            expires_at: Utc::now(),
        };
        assert!(matches!(
            a.into_attachment(),
            Err(AnnouncementError::MissingProperty("source_host_path"))
        ));
    }

    #[test]
    fn builds_attachment_from_complete_announcement() {
        let a = Announcement {
            attachment_type: AttachmentType::TaskAttachBlockStorage,
            attachment_arn: "arn:a".into(),
            cluster_arn: "arn:c".into(),
            container_instance_arn: "arn:ci".into(),
            properties: props(&[
                ("volume_id", "v1"),
                ("source_host_path", "/ecs/volX"),
                ("filesystem_type", "ext4"),
            ]),
            expires_at: Utc::now(),
        };
        let attachment = a.into_attachment().unwrap();
        assert_eq!(attachment.volume_id.as_str(), "v1");
    }
}
