// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use attach_adapters::discovery::HostDiscoveryAdapter;
use attach_adapters::event_sink::ChannelEventSink;
use attach_adapters::stage::GrpcStageClient;
use attach_adapters::supervisor::ProcessDaemonSupervisor;
use attach_core::{AttachmentStore, SystemClock};
use attach_daemon::{config, ingest};
use attach_engine::{Reconciler, ReconcilerConfig};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if std::env::args().nth(1).as_deref() == Some("--version") {
        println!("attachd {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let node_stage_timeout = config::node_stage_timeout();
    let csi_socket_path = config::csi_socket_path();

    let stage_client = match GrpcStageClient::connect(&csi_socket_path, node_stage_timeout).await {
        Ok(client) => Arc::new(client),
        Err(source) => {
            error!(%source, path = %csi_socket_path.display(), "failed to connect to node-storage driver socket");
            std::process::exit(1);
        }
    };

    let store = Arc::new(AttachmentStore::new());
    let discovery = Arc::new(HostDiscoveryAdapter::new(config::discovery_scan_root()));
    let supervisor = Arc::new(ProcessDaemonSupervisor::new(
        config::csi_helper_binary_path(),
        csi_socket_path,
    ));
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(256);
    let event_sink = Arc::new(ChannelEventSink::new(event_tx));
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!(attachment_arn = %event.attachment_arn, "attachment state change delivered");
        }
    });

    let reconciler = Arc::new(Reconciler::new(
        store,
        discovery,
        stage_client,
        supervisor,
        event_sink,
        Arc::new(SystemClock),
        ReconcilerConfig {
            scan_period: config::scan_period(),
            mount_root: config::mount_root(),
        },
    ));

    let root_cancellation = CancellationToken::new();

    let scan_task = tokio::spawn(reconciler.clone().run(root_cancellation.child_token()));
    let ingest_task = tokio::spawn(ingest::serve(
        config::ingest_socket_path(),
        reconciler,
        root_cancellation.child_token(),
    ));

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(source) => {
            error!(%source, "failed to install SIGTERM handler");
            std::process::exit(1);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(source) => {
            error!(%source, "failed to install SIGINT handler");
            std::process::exit(1);
        }
    };

    println!("READY");
    info!("attachd started");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    root_cancellation.cancel();
    let _ = scan_task.await;
    ingest_task.abort();
    info!("attachd stopped");
}
