// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use attach_adapters::event_sink::AttachmentStateChange;
use attach_adapters::stage::{AccessMode, NodeStageRequest};
use attach_adapters::{DaemonSupervisor, DiscoveryAdapter, EventSink, EventSinkError, StageClient};
use attach_core::announcement::Announcement;
use attach_core::attachment::AttachmentType;
use attach_core::{AttachmentStore, Clock, VolumeId};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::ack_timers::AckTimers;
use crate::error::{AdmissionError, ReconcileError};

/// CSI's literal sentinel used by the original watcher; carried forward
/// unchanged (§9 open question 1 is left unresolved — see DESIGN.md).
pub const FS_GROUP_SENTINEL: i64 = 123_456;

pub struct ReconcilerConfig {
    pub scan_period: Duration,
    pub mount_root: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            scan_period: Duration::from_secs(1),
            mount_root: "/mnt/ecs/ebs".to_string(),
        }
    }
}

/// Owns the attachment store and drives both entry points named in §4.F:
/// admission (called per incoming announcement) and the periodic scan
/// loop (discover -> override device names -> stage_all -> notify_all).
pub struct Reconciler {
    store: Arc<AttachmentStore>,
    discovery: Arc<dyn DiscoveryAdapter>,
    stage_client: Arc<dyn StageClient>,
    supervisor: Arc<dyn DaemonSupervisor>,
    event_sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    timers: Arc<AckTimers>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<AttachmentStore>,
        discovery: Arc<dyn DiscoveryAdapter>,
        stage_client: Arc<dyn StageClient>,
        supervisor: Arc<dyn DaemonSupervisor>,
        event_sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            discovery,
            stage_client,
            supervisor,
            event_sink,
            clock,
            timers: Arc::new(AckTimers::new()),
            config,
        }
    }

    /// §4.F admission entry point.
    #[instrument(skip(self, announcement))]
    pub async fn admit(&self, announcement: Announcement) -> Result<(), AdmissionError> {
        if announcement.attachment_type != AttachmentType::TaskAttachBlockStorage {
            warn!("dropping announcement of unsupported attachment type");
            return Ok(());
        }

        let Some(volume_id) = announcement.volume_id().map(VolumeId::new) else {
            warn!("dropping announcement missing volume_id property");
            return Ok(());
        };

        if self.store.contains(&volume_id) {
            info!(%volume_id, "duplicate admission, re-arming timer");
            self.rearm_timer(&volume_id);
            return Ok(());
        }

        self.supervisor
            .ensure_launched()
            .await
            .map_err(AdmissionError::HelperLaunchFailed)?;

        let expires_at = announcement.expires_at;
        let mut attachment = match announcement.into_attachment() {
            Ok(attachment) => attachment,
            Err(source) => {
                warn!(%source, "dropping malformed announcement");
                return Ok(());
            }
        };
        // Arm-before-add ordering, matching the original watcher: the
        // bookkeeping flag is set on the owned record before it is made
        // visible in the store.
        attachment.mark_timer_armed();
        let volume_id = attachment.volume_id.clone();
        self.store
            .add(attachment)
            .map_err(|source| AdmissionError::StoreInsertionFailed {
                volume_id: volume_id.clone(),
                source,
            })?;

        let now = self.clock.now();
        let duration = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
        self.spawn_ack_timer(volume_id, duration);
        Ok(())
    }

    fn rearm_timer(&self, volume_id: &VolumeId) {
        let Some(attachment) = self.store.get(volume_id) else {
            return;
        };
        let was_unarmed = self
            .store
            .mutate(volume_id, |a| a.mark_timer_armed())
            .unwrap_or(false);
        if was_unarmed {
            let now = self.clock.now();
            let duration = (attachment.expires_at - now).to_std().unwrap_or(Duration::ZERO);
            self.spawn_ack_timer(volume_id.clone(), duration);
        }
    }

    fn spawn_ack_timer(&self, volume_id: VolumeId, duration: Duration) {
        let store = self.store.clone();
        let timer_volume_id = volume_id.clone();
        // Safety net only: the `AckTimers` map entry is normally removed by
        // `disarm` on a successful send. A timer that fires on its own
        // forgets itself here so an expired-and-removed volume doesn't
        // linger in the timer registry for the rest of the process.
        let timers = self.timers.clone();
        self.timers.arm(volume_id, duration, move || async move {
            handle_ack_timeout(&store, &timer_volume_id);
            timers.forget(&timer_volume_id);
        });
    }

    /// Runs the periodic scan loop until `cancellation` fires. The ticker
    /// is created before the loop body — constructing it freshly on each
    /// iteration (e.g. via `sleep`) would mean a slow tick never catches
    /// up, and ticks would drift under load.
    pub async fn run(self: Arc<Self>, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.scan_period);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("reconciler scan loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(source) = self.scan_once(cancellation.child_token()).await {
                        error!(%source, "scan tick failed, retrying next tick");
                    }
                }
            }
        }
    }

    #[instrument(skip(self, cancellation))]
    async fn scan_once(&self, cancellation: CancellationToken) -> Result<(), ReconcileError> {
        let now = self.clock.now();
        let pending = self.store.pending(now);
        if pending.is_empty() {
            return Ok(());
        }
        let pending_ids: Vec<VolumeId> = pending.iter().map(|a| a.volume_id.clone()).collect();

        let found = self
            .discovery
            .discover(&pending_ids)
            .await
            .map_err(ReconcileError::Discovery)?;
        if found.is_empty() {
            return Ok(());
        }

        self.override_device_names(&found);
        self.stage_all(&found, cancellation).await;
        self.notify_all(&found).await;
        Ok(())
    }

    /// Unconditional device-name override for every volume in the current
    /// discovery result, run before any of `stage_all`'s per-volume skip
    /// checks (§11 supplement 1 / §9 open question 3 — implemented
    /// literally as observed in the source this was distilled from).
    fn override_device_names(&self, found: &HashMap<VolumeId, String>) {
        for (volume_id, device_path) in found {
            let result = self
                .store
                .mutate(volume_id, |a| a.set_device_name(device_path.clone()));
            if result.is_err() {
                warn!(%volume_id, "discovered volume has no matching attachment record");
            }
        }
    }

    async fn stage_all(&self, found: &HashMap<VolumeId, String>, cancellation: CancellationToken) {
        for (volume_id, device_path) in found {
            let Some(attachment) = self.store.get(volume_id) else {
                continue;
            };
            if attachment.is_sent() || attachment.has_expired(self.clock.now()) || attachment.is_attached() {
                continue;
            }

            let Some(target_path) = attachment.target_path(&self.config.mount_root) else {
                warn!(%volume_id, "attachment missing source_host_path, cannot stage");
                continue;
            };
            let Some(fs_type) = attachment.filesystem_type() else {
                warn!(%volume_id, "attachment missing filesystem_type, cannot stage");
                continue;
            };

            let mut publish_context = HashMap::new();
            publish_context.insert("devicePath".to_string(), device_path.clone());

            let request = NodeStageRequest {
                volume_id: volume_id.clone(),
                publish_context,
                target_path: target_path.to_string_lossy().into_owned(),
                fs_type: fs_type.to_string(),
                access_mode: AccessMode::ReadWriteMany,
                secrets: HashMap::new(),
                volume_context: HashMap::new(),
                mount_options: Vec::new(),
                fs_group: FS_GROUP_SENTINEL,
            };

            match self
                .stage_client
                .node_stage(request, cancellation.child_token())
                .await
            {
                Ok(()) => {
                    info!(%volume_id, "volume staged");
                    let _ = self.store.mutate(volume_id, |a| a.mark_attached());
                }
                Err(source) => {
                    // Abort the whole batch on first failure; the
                    // remaining volumes retry on the next tick (§7).
                    error!(%volume_id, %source, "stage failed, aborting batch");
                    return;
                }
            }
        }
    }

    async fn notify_all(&self, found: &HashMap<VolumeId, String>) {
        for volume_id in found.keys() {
            let Some(attachment) = self.store.get(volume_id) else {
                continue;
            };
            if attachment.has_expired(self.clock.now()) || attachment.is_sent() {
                continue;
            }
            if !attachment.is_attached() {
                continue;
            }

            let event = AttachmentStateChange {
                attachment_arn: attachment.attachment_arn.clone(),
                expires_at: attachment.expires_at,
                cluster_arn: attachment.cluster_arn.clone(),
                container_instance_arn: attachment.container_instance_arn.clone(),
            };

            match self.event_sink.emit_attached(event).await {
                Ok(()) | Err(EventSinkError::AlreadySent(_)) => {
                    let _ = self.store.mutate(volume_id, |a| a.mark_sent());
                    self.timers.disarm(volume_id);
                }
                Err(source) => {
                    warn!(%volume_id, %source, "event delivery failed, will retry");
                }
            }
        }
    }
}

/// §7 "ack-timer expiry" handling: remove if never sent, no-op otherwise.
fn handle_ack_timeout(store: &AttachmentStore, volume_id: &VolumeId) {
    let Some(attachment) = store.get(volume_id) else {
        warn!(%volume_id, "ack timer fired for unknown volume");
        return;
    };
    if !attachment.is_sent() {
        info!(%volume_id, "ack timer expired before send, removing attachment");
        store.remove(volume_id);
    }
}

#[cfg(test)]
#[path = "reconciler_tests/mod.rs"]
mod tests;
