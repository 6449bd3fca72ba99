// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::admin::{connect_registry, ensure_tool, host_address, network_address, Admin};
use crate::constants::{registry as registry_constants, tools};
use crate::error::{DevclusterError, Result};
use crate::kubernetes::ContextStore;
use crate::process::{args, CommandRunner};
use crate::types::{Cluster, LocalRegistryHostingV1, Registry};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Network kind attaches its node containers to
const KIND_NETWORK: &str = "kind";
const CONTEXT_PREFIX: &str = "kind-";
const NODE_IMAGE: &str = "kindest/node";

/// Clusters run by `kind`, one container per node
pub struct KindAdmin {
    runner: Arc<dyn CommandRunner>,
    contexts: Arc<dyn ContextStore>,
    binary: String,
}

impl KindAdmin {
    pub fn new(runner: Arc<dyn CommandRunner>, contexts: Arc<dyn ContextStore>) -> Self {
        Self {
            runner,
            contexts,
            binary: tools::KIND.to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn cluster_exists(&self, name: &str) -> Result<bool> {
        let output = self
            .runner
            .run(&self.binary, &args(["get", "clusters"]), None)
            .await?;
        Ok(output.lines().any(|line| line.trim() == name))
    }
}

/// kind names its context `kind-<cluster>`
fn kind_cluster_name(context: &str) -> Result<&str> {
    context
        .strip_prefix(CONTEXT_PREFIX)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            DevclusterError::NotSupported(format!(
                "kind cluster name {:?} must start with {:?}",
                context, CONTEXT_PREFIX
            ))
        })
}

fn node_image(version: &str) -> String {
    if version.starts_with('v') {
        format!("{}:{}", NODE_IMAGE, version)
    } else {
        format!("{}:v{}", NODE_IMAGE, version)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KindConfig {
    kind: &'static str,
    api_version: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    containerd_config_patches: Vec<String>,
}

impl KindConfig {
    fn new(registry: Option<&Registry>) -> Self {
        let containerd_config_patches = registry
            .map(|r| {
                vec![format!(
                    "[plugins.\"io.containerd.grpc.v1.cri\".registry.mirrors.\"{}\"]\n  endpoint = [\"http://{}\"]",
                    host_address(r),
                    network_address(r)
                )]
            })
            .unwrap_or_default();

        Self {
            kind: "Cluster",
            api_version: "kind.x-k8s.io/v1alpha4",
            containerd_config_patches,
        }
    }
}

#[async_trait]
impl Admin for KindAdmin {
    async fn ensure_installed(&self) -> Result<()> {
        ensure_tool(&self.binary, tools::KIND_HELP)
    }

    #[instrument(skip(self, desired, registry), fields(cluster = %desired.name))]
    async fn create(&self, desired: &Cluster, registry: Option<&Registry>) -> Result<()> {
        let name = kind_cluster_name(&desired.name)?;

        if self.cluster_exists(name).await? {
            info!("kind cluster {} already exists, exporting its kubeconfig", name);
            self.runner
                .run(&self.binary, &args(["export", "kubeconfig", "--name", name]), None)
                .await?;
        } else {
            let mut argv = args(["create", "cluster", "--name", name]);
            if let Some(version) = &desired.kubernetes_version {
                argv.push("--image".to_string());
                argv.push(node_image(version));
            }
            argv.extend(args(["--config", "-"]));

            let config = serde_yaml::to_string(&KindConfig::new(registry))?;
            info!("Creating kind cluster {}", name);
            self.runner
                .run(&self.binary, &argv, Some(config.as_bytes()))
                .await?;
        }

        if let Some(registry) = registry {
            connect_registry(self.runner.as_ref(), KIND_NETWORK, registry).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, cluster), fields(cluster = %cluster.name))]
    async fn delete(&self, cluster: &Cluster) -> Result<()> {
        let name = kind_cluster_name(&cluster.name)?;
        if self.cluster_exists(name).await? {
            info!("Deleting kind cluster {}", name);
            self.runner
                .run(&self.binary, &args(["delete", "cluster", "--name", name]), None)
                .await?;
        } else {
            debug!("kind cluster {} does not exist", name);
        }

        if self.contexts.remove_context(&cluster.name)? {
            info!("Removed stale context {}", cluster.name);
        }
        Ok(())
    }

    fn local_registry_hosting(&self, registry: &Registry) -> LocalRegistryHostingV1 {
        LocalRegistryHostingV1 {
            host: host_address(registry),
            host_from_container_runtime: None,
            host_from_cluster_network: Some(network_address(registry)),
            help: Some(registry_constants::KIND_HELP.to_string()),
        }
    }
}
