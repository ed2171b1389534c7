// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use attach_core::{AttachmentArn, ClusterArn, ContainerInstanceArn};
use chrono::{DateTime, Utc};
use thiserror::Error;

mod channel;
#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use channel::ChannelEventSink;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEventSink;

/// Outbound `AttachmentStateChange` payload (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentStateChange {
    pub attachment_arn: AttachmentArn,
    pub expires_at: DateTime<Utc>,
    pub cluster_arn: ClusterArn,
    pub container_instance_arn: ContainerInstanceArn,
}

#[derive(Debug, Error)]
pub enum EventSinkError {
    /// Typed discriminator for "this exact state change was already
    /// delivered" (§9 open question 4: prefer this over substring
    /// matching on an error message).
    #[error("attachment {0} was already sent")]
    AlreadySent(AttachmentArn),
    #[error("event delivery failed: {0}")]
    Other(String),
}

/// Forwards an *attached* transition to the outbound event sink (§4.G).
/// Delivery is asynchronous from the caller's perspective: implementations
/// hand the event off and return quickly; backpressure on the underlying
/// queue is not surfaced as a blocking wait here.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn emit_attached(&self, event: AttachmentStateChange) -> Result<(), EventSinkError>;
}
