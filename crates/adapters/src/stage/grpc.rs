// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint, Uri};
use tonic::Request;
use tower::service_fn;
use tracing::instrument;

use super::{AccessMode, NodeStageRequest, StageClient, StageError};

pub mod proto {
    tonic::include_proto!("attach.csi.v1");
}

use proto::node_client::NodeClient;
use proto::{volume_capability, NodeStageVolumeRequest, VolumeCapability};

/// Thin wrapper over the generated CSI Node client, connected over a Unix
/// domain socket (§6). Every call is bounded by `timeout` and aborts
/// early if `cancellation` fires.
pub struct GrpcStageClient {
    inner: NodeClient<Channel>,
    timeout: Duration,
}

impl GrpcStageClient {
    pub async fn connect(
        socket_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, StageError> {
        let socket_path = socket_path.into();
        // Endpoint URI is unused by the connector below; required by tonic's API shape.
        let channel = Endpoint::try_from("http://[::]:0")
            .map_err(|e| StageError::Rpc(e.to_string()))?
            .connect_with_connector(service_fn(move |_: Uri| {
                let socket_path = socket_path.clone();
                async move { tokio::net::UnixStream::connect(socket_path).await }
            }))
            .await
            .map_err(|e| StageError::Rpc(e.to_string()))?;
        Ok(Self {
            inner: NodeClient::new(channel),
            timeout,
        })
    }
}

#[async_trait]
impl StageClient for GrpcStageClient {
    #[instrument(name = "GrpcStageClient::node_stage", skip(self, request, cancellation), fields(volume_id = %request.volume_id), err)]
    async fn node_stage(
        &self,
        request: NodeStageRequest,
        cancellation: CancellationToken,
    ) -> Result<(), StageError> {
        let access_mode = match request.access_mode {
            AccessMode::ReadWriteMany => volume_capability::AccessMode::ReadWriteMany as i32,
        };
        let wire = NodeStageVolumeRequest {
            volume_id: request.volume_id.into_string(),
            publish_context: request.publish_context,
            staging_target_path: request.target_path,
            volume_capability: Some(VolumeCapability {
                mount: Some(volume_capability::MountVolume {
                    fs_type: request.fs_type,
                    mount_flags: request.mount_options,
                }),
                access_mode,
            }),
            secrets: request.secrets,
            volume_context: request.volume_context,
            fs_group: request.fs_group,
        };

        let mut client = self.inner.clone();
        let call = client.node_stage_volume(Request::new(wire));

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(StageError::Cancelled),
            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(status)) => Err(StageError::Rpc(status.to_string())),
                Err(_) => Err(StageError::Timeout(self.timeout)),
            },
        }
    }
}
