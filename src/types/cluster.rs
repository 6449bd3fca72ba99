// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{API_VERSION, CLUSTER_KIND, CLUSTER_LIST_KIND};
use crate::types::hosting::LocalRegistryHostingV1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The product backing a local cluster
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Product {
    DockerDesktop,
    Kind,
    Minikube,
    #[serde(rename = "microk8s")]
    MicroK8s,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Product {
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::DockerDesktop => "docker-desktop",
            Product::Kind => "kind",
            Product::Minikube => "minikube",
            Product::MicroK8s => "microk8s",
            Product::Unknown => "unknown",
        }
    }

    /// Conventional context name for clusters of this product
    pub fn default_cluster_name(&self) -> Option<&'static str> {
        match self {
            Product::DockerDesktop => Some("docker-desktop"),
            Product::Kind => Some("kind-kind"),
            Product::Minikube => Some("minikube"),
            Product::MicroK8s => Some("microk8s"),
            Product::Unknown => None,
        }
    }

    /// Whether clusters of this product run on the local container engine
    pub fn uses_container_engine(&self) -> bool {
        matches!(
            self,
            Product::DockerDesktop | Product::Kind | Product::Minikube
        )
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "docker-desktop" => Product::DockerDesktop,
            "kind" => Product::Kind,
            "minikube" => Product::Minikube,
            "microk8s" => Product::MicroK8s,
            _ => Product::Unknown,
        })
    }
}

/// A local development cluster, keyed by its kubeconfig context name
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_cluster_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub product: Product,
    #[serde(default, rename = "minCPUs", skip_serializing_if = "is_zero")]
    pub min_cpus: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default)]
    pub status: ClusterStatus,
}

impl Default for Cluster {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_cluster_kind(),
            name: String::new(),
            product: Product::Unknown,
            min_cpus: 0,
            kubernetes_version: None,
            registry: None,
            status: ClusterStatus::default(),
        }
    }
}

impl Cluster {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>, product: Product) -> Self {
        Self {
            name: name.into(),
            product,
            ..Default::default()
        }
    }

    /// Fill in the conventional name for the product when none was given
    pub fn fill_defaults(&mut self) {
        if self.name.is_empty() {
            if let Some(name) = self.product.default_cluster_name() {
                self.name = name.to_string();
            }
        }
    }

    /// Observed Kubernetes version, if the cluster answered
    pub fn observed_version(&self) -> Option<&str> {
        self.status.kubernetes_version.as_deref()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<Time>,
    #[serde(default)]
    pub current: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_registry_hosting: Option<LocalRegistryHostingV1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
    #[serde(default, rename = "cpus", skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterList {
    pub api_version: String,
    pub kind: String,
    pub items: Vec<Cluster>,
}

impl ClusterList {
    pub fn new(items: Vec<Cluster>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: CLUSTER_LIST_KIND.to_string(),
            items,
        }
    }
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_cluster_kind() -> String {
    CLUSTER_KIND.to_string()
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}
