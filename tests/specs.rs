// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end behavioral specifications for the attachment-lifecycle
//! controller, wired against the fake adapters (SPEC_FULL.md §10.5).
//! These exercise the public `Reconciler` surface (`admit`/`run`) rather
//! than engine-crate internals, covering the round-trip properties and
//! concrete scenarios from spec.md §8.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use attach_adapters::discovery::FakeDiscoveryAdapter;
use attach_adapters::event_sink::FakeEventSink;
use attach_adapters::stage::{AccessMode, FakeStageClient, StageError};
use attach_adapters::supervisor::FakeDaemonSupervisor;
use attach_core::attachment::{property_keys, AttachmentType};
use attach_core::{Announcement, AttachmentStore, FakeClock, VolumeId};
use attach_engine::{Reconciler, ReconcilerConfig};
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

struct Harness {
    reconciler: Arc<Reconciler>,
    discovery: Arc<FakeDiscoveryAdapter>,
    stage: Arc<FakeStageClient>,
    events: Arc<FakeEventSink>,
    supervisor: Arc<FakeDaemonSupervisor>,
    store: Arc<AttachmentStore>,
    clock: Arc<FakeClock>,
}

fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn harness(scan_period: Duration) -> Harness {
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
        ReconcilerConfig {
            scan_period,
            ..ReconcilerConfig::default()
        },
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

/// Lets the cooperative scheduler drain whatever became ready as a result
/// of the last time advance, without relying on real wall-clock sleeps.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Property 6 / S1: admit -> discover -> stage succeeds -> notify succeeds
/// yields exactly one outbound event, with the exact stage arguments
/// spec.md §8 S1 calls out.
#[tokio::test(start_paused = true)]
async fn round_trip_happy_path_emits_exactly_one_event() {
    let h = harness(Duration::from_millis(50));
    let token = CancellationToken::new();
    let run_handle = tokio::spawn(h.reconciler.clone().run(token.child_token()));
    settle().await;

    let now = h.clock.now();
    h.reconciler
        .admit(announcement("v1", 60, now))
        .await
        .unwrap();

    let mut found = HashMap::new();
    found.insert(VolumeId::new("v1"), "/dev/nvme1n1".to_string());
    h.discovery.push_result(found);

    tokio::time::advance(Duration::from_millis(60)).await;
    settle().await;

    let calls = h.stage.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target_path, "/mnt/ecs/ebs/v1");
    assert_eq!(calls[0].publish_context.get("devicePath").unwrap(), "/dev/nvme1n1");
    assert_eq!(calls[0].access_mode, AccessMode::ReadWriteMany);

    assert_eq!(h.events.sent_events().len(), 1);
    let attachment = h.store.get(&VolumeId::new("v1")).unwrap();
    assert!(attachment.is_attached());
    assert!(attachment.is_sent());

    token.cancel();
    settle().await;
    let _ = run_handle.await;
}

/// S3 / property 6 retried: a failed stage call does not emit an event and
/// is retried with identical arguments on the following tick.
#[tokio::test(start_paused = true)]
async fn stage_failure_is_retried_on_next_tick_with_identical_arguments() {
    let h = harness(Duration::from_millis(50));
    let token = CancellationToken::new();
    let run_handle = tokio::spawn(h.reconciler.clone().run(token.child_token()));
    settle().await;

    let now = h.clock.now();
    h.reconciler
        .admit(announcement("v3", 60, now))
        .await
        .unwrap();

    let mut found = HashMap::new();
    found.insert(VolumeId::new("v3"), "/dev/nvme3n1".to_string());
    h.stage.push_result(Err(StageError::Timeout(Duration::from_secs(2))));
    h.discovery.push_result(found.clone());

    tokio::time::advance(Duration::from_millis(60)).await;
    settle().await;
    assert!(h.events.sent_events().is_empty());
    assert!(!h.store.get(&VolumeId::new("v3")).unwrap().is_attached());

    h.discovery.push_result(found);
    tokio::time::advance(Duration::from_millis(60)).await;
    settle().await;

    let calls = h.stage.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].target_path, calls[1].target_path);
    assert_eq!(h.events.sent_events().len(), 1);

    token.cancel();
    settle().await;
    let _ = run_handle.await;
}

/// Property 7 / S5: re-admitting an already-known volume is a single
/// insertion with an idempotent timer, before any tick has run.
#[tokio::test]
async fn duplicate_admission_is_a_single_insertion() {
    let h = harness(Duration::from_secs(60));
    let now = h.clock.now();
    h.reconciler
        .admit(announcement("v5", 60, now))
        .await
        .unwrap();
    h.reconciler
        .admit(announcement("v5", 60, now))
        .await
        .unwrap();

    assert_eq!(h.store.len(), 1);
    assert_eq!(h.supervisor.launch_count(), 1);
}

/// S6: an announcement of an unsupported attachment type is dropped
/// without touching the store, the supervisor, or the event sink.
#[tokio::test]
async fn unsupported_attachment_type_is_silently_dropped() {
    let h = harness(Duration::from_secs(60));
    let now = h.clock.now();
    let mut a = announcement("v6", 60, now);
    a.attachment_type = AttachmentType::Unsupported;

    h.reconciler.admit(a).await.unwrap();

    assert!(h.store.is_empty());
    assert_eq!(h.supervisor.launch_count(), 0);
    assert!(h.events.sent_events().is_empty());
}

/// Property 4 / S4: an attachment whose ack timer fires before it is sent
/// is eventually absent from the store, with no stage call or event ever
/// issued for it.
#[tokio::test(start_paused = true)]
async fn expired_attachment_is_eventually_removed() {
    let h = harness(Duration::from_secs(60));
    let now = h.clock.now();
    h.reconciler
        .admit(announcement("v4", 2, now))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(3)).await;
    settle().await;

    assert!(h.store.get(&VolumeId::new("v4")).is_none());
    assert!(h.stage.calls().is_empty());
    assert!(h.events.sent_events().is_empty());
}

/// Property 5: cancelling the reconciler's context causes the scan task to
/// terminate promptly, well within a single scan period.
#[tokio::test]
async fn cancellation_terminates_scan_loop_within_one_tick_period() {
    let h = harness(Duration::from_millis(20));
    let token = CancellationToken::new();
    let run_handle = tokio::spawn(h.reconciler.clone().run(token.child_token()));

    tokio::time::sleep(Duration::from_millis(5)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_millis(500), run_handle).await;
    assert!(result.is_ok(), "scan loop did not terminate after cancellation");
}

/// Property 1, exercised across a full round trip: sent implies attached
/// at every observation point, not just at the end.
#[tokio::test(start_paused = true)]
async fn sent_implies_attached_throughout_the_round_trip() {
    let h = harness(Duration::from_millis(50));
    let token = CancellationToken::new();
    let run_handle = tokio::spawn(h.reconciler.clone().run(token.child_token()));
    settle().await;

    let now = h.clock.now();
    h.reconciler
        .admit(announcement("v7", 60, now))
        .await
        .unwrap();
    let mut found = HashMap::new();
    found.insert(VolumeId::new("v7"), "/dev/nvme7n1".to_string());
    h.discovery.push_result(found);

    tokio::time::advance(Duration::from_millis(60)).await;
    settle().await;

    let attachment = h.store.get(&VolumeId::new("v7")).unwrap();
    if attachment.is_sent() {
        assert!(attachment.is_attached());
    }

    token.cancel();
    settle().await;
    let _ = run_handle.await;
}
