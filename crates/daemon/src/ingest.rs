// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ambient ingestion listener (SPEC_FULL.md §10.4): a Unix domain socket
//! accepting newline-delimited JSON `Announcement` payloads. The real
//! control-plane transport is explicitly out of scope; this exists only
//! so the daemon binary is runnable end to end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use attach_core::Announcement;
use attach_engine::Reconciler;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub async fn serve(
    socket_path: PathBuf,
    reconciler: Arc<Reconciler>,
    cancellation: CancellationToken,
) -> std::io::Result<()> {
    if let Some(parent) = socket_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    remove_stale_socket(&socket_path).await;

    let listener = UnixListener::bind(&socket_path)?;
    info!(path = %socket_path.display(), "ingestion listener bound");

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                info!("ingestion listener shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, _addr) = match accepted {
                    Ok(pair) => pair,
                    Err(source) => {
                        error!(%source, "failed to accept ingestion connection");
                        continue;
                    }
                };
                let reconciler = reconciler.clone();
                tokio::spawn(async move {
                    handle_connection(stream, reconciler).await;
                });
            }
        }
    }
    Ok(())
}

async fn handle_connection(stream: tokio::net::UnixStream, reconciler: Arc<Reconciler>) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                let announcement: Announcement = match serde_json::from_str(&line) {
                    Ok(announcement) => announcement,
                    Err(source) => {
                        warn!(%source, "dropping malformed announcement payload");
                        continue;
                    }
                };
                if let Err(source) = reconciler.admit(announcement).await {
                    error!(%source, "admission failed");
                }
            }
            Ok(None) => {
                debug!("ingestion connection closed");
                break;
            }
            Err(source) => {
                error!(%source, "ingestion connection read error");
                break;
            }
        }
    }
}

async fn remove_stale_socket(path: &Path) {
    if tokio::net::UnixStream::connect(path).await.is_ok() {
        warn!(path = %path.display(), "ingestion socket already in use");
        return;
    }
    let _ = tokio::fs::remove_file(path).await;
}
