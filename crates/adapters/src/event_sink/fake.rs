// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;

use async_trait::async_trait;
use attach_core::AttachmentArn;
use parking_lot::Mutex;

use super::{AttachmentStateChange, EventSink, EventSinkError};

/// Records every emitted event and can be scripted to simulate a
/// duplicate-send rejection (S1/S3's "exactly one event" assertions) or an
/// arbitrary transient failure.
#[derive(Default)]
pub struct FakeEventSink {
    sent: Mutex<Vec<AttachmentStateChange>>,
    already_sent: Mutex<HashSet<AttachmentArn>>,
    fail_next: Mutex<Option<String>>,
}

impl FakeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_already_sent(&self, arn: AttachmentArn) {
        self.already_sent.lock().insert(arn);
    }

    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    pub fn sent_events(&self) -> Vec<AttachmentStateChange> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl EventSink for FakeEventSink {
    async fn emit_attached(&self, event: AttachmentStateChange) -> Result<(), EventSinkError> {
        if self.already_sent.lock().contains(&event.attachment_arn) {
            return Err(EventSinkError::AlreadySent(event.attachment_arn));
        }
        if let Some(message) = self.fail_next.lock().take() {
            return Err(EventSinkError::Other(message));
        }
        self.sent.lock().push(event);
        Ok(())
    }
}
