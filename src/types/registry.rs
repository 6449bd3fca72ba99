// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{API_VERSION, REGISTRY_KIND, REGISTRY_LIST_KIND};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde::{Deserialize, Serialize};

/// A local image registry running as a container on the engine
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_registry_kind")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub status: RegistryStatus,
}

impl Registry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_registry_kind(),
            name: name.into(),
            status: RegistryStatus::default(),
        }
    }

    /// Whether the registry container is attached to the given network
    pub fn is_on_network(&self, network: &str) -> bool {
        self.status.networks.iter().any(|n| n == network)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<Time>,
    #[serde(default)]
    pub host_port: u16,
    #[serde(default)]
    pub container_port: u16,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub container_id: String,
    #[serde(default)]
    pub networks: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryList {
    pub api_version: String,
    pub kind: String,
    pub items: Vec<Registry>,
}

impl RegistryList {
    pub fn new(items: Vec<Registry>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: REGISTRY_LIST_KIND.to_string(),
            items,
        }
    }
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_registry_kind() -> String {
    REGISTRY_KIND.to_string()
}
