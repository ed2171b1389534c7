// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use attach_adapters::discovery::FakeDiscoveryAdapter;
use attach_adapters::event_sink::FakeEventSink;
use attach_adapters::stage::FakeStageClient;
use attach_adapters::stage::StageError;
use attach_adapters::supervisor::FakeDaemonSupervisor;
use attach_core::attachment::{property_keys, AttachmentType};
use attach_core::{Announcement, AttachmentStore, FakeClock, VolumeId};
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use super::*;

fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

struct Harness {
    reconciler: Arc<Reconciler>,
    discovery: Arc<FakeDiscoveryAdapter>,
    stage: Arc<FakeStageClient>,
    events: Arc<FakeEventSink>,
    supervisor: Arc<FakeDaemonSupervisor>,
    store: Arc<AttachmentStore>,
    clock: Arc<FakeClock>,
}

fn harness() -> Harness {
    let discovery = Arc::new(FakeDiscoveryAdapter::new());
    let stage = Arc::new(FakeStageClient::new());
    let events = Arc::new(FakeEventSink::new());
    let supervisor = Arc::new(FakeDaemonSupervisor::new());
    let store = Arc::new(AttachmentStore::new());
    let clock = Arc::new(FakeClock::new(base_time()));

    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        discovery.clone(),
        stage.clone(),
        supervisor.clone(),
        events.clone(),
        clock.clone(),
        ReconcilerConfig::default(),
    ));

    Harness {
        reconciler,
        discovery,
        stage,
        events,
        supervisor,
        store,
        clock,
    }
}

fn announcement(volume_id: &str, ttl_secs: i64, now: DateTime<Utc>) -> Announcement {
    let mut properties = HashMap::new();
    properties.insert(property_keys::VOLUME_ID.to_string(), volume_id.to_string());
    properties.insert(
        property_keys::SOURCE_HOST_PATH.to_string(),
        format!("/ecs/{volume_id}"),
    );
    properties.insert(property_keys::FILESYSTEM_TYPE.to_string(), "ext4".to_string());
    Announcement {
        attachment_type: AttachmentType::TaskAttachBlockStorage,
        attachment_arn: format!("arn:attach:{volume_id}"),
        cluster_arn: "arn:cluster:1".to_string(),
        container_instance_arn: "arn:ci:1".to_string(),
        properties,
        expires_at: now + chrono::Duration::seconds(ttl_secs),
    }
}

#[tokio::test]
async fn s1_happy_path() {
    let h = harness();
    let now = h.clock.now();
    h.reconciler.admit(announcement("v1", 60, now)).await.unwrap();

    let mut found = HashMap::new();
    found.insert(VolumeId::new("v1"), "/dev/nvme1n1".to_string());
    h.discovery.push_result(found);

    h.reconciler.scan_once(CancellationToken::new()).await.unwrap();

    let calls = h.stage.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target_path, "/mnt/ecs/ebs/v1");
    assert_eq!(
        calls[0].publish_context.get("devicePath").unwrap(),
        "/dev/nvme1n1"
    );
    assert_eq!(calls[0].access_mode, AccessMode::ReadWriteMany);

    let sent = h.events.sent_events();
    assert_eq!(sent.len(), 1);

    let attachment = h.store.get(&VolumeId::new("v1")).unwrap();
    assert!(attachment.is_sent());
    assert!(attachment.is_attached());
    assert!(!h.reconciler.timers.is_armed(&VolumeId::new("v1")));
}

#[tokio::test]
async fn s2_delayed_discovery() {
    let h = harness();
    let now = h.clock.now();
    h.reconciler.admit(announcement("v2", 10, now)).await.unwrap();

    for _ in 0..3 {
        h.discovery.push_result(HashMap::new());
        h.reconciler.scan_once(CancellationToken::new()).await.unwrap();
    }
    assert!(h.stage.calls().is_empty());

    let mut found = HashMap::new();
    found.insert(VolumeId::new("v2"), "/dev/nvme2n1".to_string());
    h.discovery.push_result(found);
    h.reconciler.scan_once(CancellationToken::new()).await.unwrap();

    assert_eq!(h.stage.calls().len(), 1);
    assert_eq!(h.events.sent_events().len(), 1);
}

#[tokio::test]
async fn s3_stage_retry() {
    let h = harness();
    let now = h.clock.now();
    h.reconciler.admit(announcement("v3", 60, now)).await.unwrap();

    let mut found = HashMap::new();
    found.insert(VolumeId::new("v3"), "/dev/nvme3n1".to_string());
    h.discovery.push_result(found.clone());
    h.stage.push_result(Err(StageError::Timeout(Duration::from_secs(2))));
    h.reconciler.scan_once(CancellationToken::new()).await.unwrap();

    assert!(h.events.sent_events().is_empty());
    assert!(!h.store.get(&VolumeId::new("v3")).unwrap().is_attached());

    h.discovery.push_result(found);
    h.reconciler.scan_once(CancellationToken::new()).await.unwrap();

    let calls = h.stage.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].target_path, calls[1].target_path);
    assert_eq!(h.events.sent_events().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn s4_expiry_before_discovery() {
    let h = harness();
    let now = h.clock.now();
    h.reconciler.admit(announcement("v4", 2, now)).await.unwrap();

    tokio::time::advance(Duration::from_secs(3)).await;
    tokio::task::yield_now().await;

    assert!(h.store.get(&VolumeId::new("v4")).is_none());
    assert!(h.stage.calls().is_empty());
    assert!(h.events.sent_events().is_empty());
}

#[tokio::test]
async fn s5_duplicate_admission() {
    let h = harness();
    let now = h.clock.now();
    h.reconciler.admit(announcement("v5", 60, now)).await.unwrap();
    h.reconciler.admit(announcement("v5", 60, now)).await.unwrap();

    assert_eq!(h.store.len(), 1);
    assert!(h.reconciler.timers.is_armed(&VolumeId::new("v5")));
    assert_eq!(h.supervisor.launch_count(), 1);
}

#[tokio::test]
async fn s6_unsupported_type() {
    let h = harness();
    let now = h.clock.now();
    let mut a = announcement("v6", 60, now);
    a.attachment_type = AttachmentType::Unsupported;
    h.reconciler.admit(a).await.unwrap();

    assert!(h.store.is_empty());
    assert_eq!(h.supervisor.launch_count(), 0);
    assert!(h.events.sent_events().is_empty());
}

#[tokio::test]
async fn invariant_sent_implies_attached() {
    let h = harness();
    let now = h.clock.now();
    h.reconciler.admit(announcement("v7", 60, now)).await.unwrap();
    let mut found = HashMap::new();
    found.insert(VolumeId::new("v7"), "/dev/nvme7n1".to_string());
    h.discovery.push_result(found);
    h.reconciler.scan_once(CancellationToken::new()).await.unwrap();

    let attachment = h.store.get(&VolumeId::new("v7")).unwrap();
    if attachment.is_sent() {
        assert!(attachment.is_attached());
    }
}

#[tokio::test]
async fn duplicate_send_is_suppressed_not_logged_as_error() {
    let h = harness();
    let now = h.clock.now();
    h.reconciler.admit(announcement("v8", 60, now)).await.unwrap();
    let mut found = HashMap::new();
    found.insert(VolumeId::new("v8"), "/dev/nvme8n1".to_string());
    h.discovery.push_result(found.clone());
    h.reconciler.scan_once(CancellationToken::new()).await.unwrap();
    assert!(h.store.get(&VolumeId::new("v8")).unwrap().is_sent());

    // A second pass after the attachment is already sent should never
    // call the stage client or event sink again (stage_all/notify_all
    // both skip already-sent attachments).
    h.discovery.push_result(found);
    h.reconciler.scan_once(CancellationToken::new()).await.unwrap();
    assert_eq!(h.stage.calls().len(), 1);
    assert_eq!(h.events.sent_events().len(), 1);
}
