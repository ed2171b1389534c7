// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

fn main() {
    tonic_build::configure()
        .build_server(false)
        .compile(&["proto/csi_node.proto"], &["proto"])
        .unwrap_or_else(|e| panic!("csi_node protobuf compilation failed: {e}"));
}
