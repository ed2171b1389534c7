// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use super::{AttachmentStateChange, EventSink, EventSinkError};

/// Hands events to a bounded channel representing the host engine's
/// state-change queue. The send itself runs on a detached task so
/// `emit_attached` never blocks the reconciler even if the queue is
/// momentarily full — backpressure is absorbed by the spawned task, not
/// by the caller (§4.G, §9 re-architecture notes).
pub struct ChannelEventSink {
    sender: mpsc::Sender<AttachmentStateChange>,
}

impl ChannelEventSink {
    pub fn new(sender: mpsc::Sender<AttachmentStateChange>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit_attached(&self, event: AttachmentStateChange) -> Result<(), EventSinkError> {
        let sender = self.sender.clone();
        let arn = event.attachment_arn.clone();
        tokio::spawn(async move {
            if sender.send(event).await.is_err() {
                warn!(%arn, "state-change queue receiver dropped, event lost");
            }
        });
        Ok(())
    }
}
