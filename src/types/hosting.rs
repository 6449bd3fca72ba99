// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The `localRegistryHosting.v1` discovery payload (KEP-1755)

use serde::{Deserialize, Serialize};

/// Advertises a local registry to tooling that builds images for the cluster
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalRegistryHostingV1 {
    /// Address to push to from the host, e.g. `localhost:5000`
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_from_container_runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_from_cluster_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl LocalRegistryHostingV1 {
    /// Port of `host`, when it is of the form `name:port`
    pub fn host_port(&self) -> Option<u16> {
        self.host.rsplit_once(':').and_then(|(_, p)| p.parse().ok())
    }
}
