// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::admin::{connect_registry, ensure_tool, host_address, network_address, Admin};
use crate::constants::{registry as registry_constants, tools};
use crate::error::Result;
use crate::kubernetes::ContextStore;
use crate::process::{args, CommandRunner};
use crate::types::{Cluster, LocalRegistryHostingV1, Registry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Clusters run by `minikube` on the docker driver; the profile is the
/// cluster name and also names the docker network
pub struct MinikubeAdmin {
    runner: Arc<dyn CommandRunner>,
    contexts: Arc<dyn ContextStore>,
    binary: String,
}

impl MinikubeAdmin {
    pub fn new(runner: Arc<dyn CommandRunner>, contexts: Arc<dyn ContextStore>) -> Self {
        Self {
            runner,
            contexts,
            binary: tools::MINIKUBE.to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl Admin for MinikubeAdmin {
    async fn ensure_installed(&self) -> Result<()> {
        ensure_tool(&self.binary, tools::MINIKUBE_HELP)
    }

    #[instrument(skip(self, desired, registry), fields(cluster = %desired.name))]
    async fn create(&self, desired: &Cluster, registry: Option<&Registry>) -> Result<()> {
        let mut argv = args(["start", "-p", desired.name.as_str(), "--driver=docker"]);
        if let Some(version) = &desired.kubernetes_version {
            argv.push(format!("--kubernetes-version={}", version));
        }
        if let Some(registry) = registry {
            argv.push(format!("--insecure-registry={}", network_address(registry)));
        }

        info!("Starting minikube profile {}", desired.name);
        self.runner.run(&self.binary, &argv, None).await?;

        if let Some(registry) = registry {
            connect_registry(self.runner.as_ref(), &desired.name, registry).await?;
        }
        Ok(())
    }

    /// `minikube delete` succeeds for unknown profiles but leaves their
    /// contexts behind
    #[instrument(skip(self, cluster), fields(cluster = %cluster.name))]
    async fn delete(&self, cluster: &Cluster) -> Result<()> {
        info!("Deleting minikube profile {}", cluster.name);
        self.runner
            .run(&self.binary, &args(["delete", "-p", cluster.name.as_str()]), None)
            .await?;
        if self.contexts.remove_context(&cluster.name)? {
            debug!("Removed leftover context {}", cluster.name);
        }
        Ok(())
    }

    fn local_registry_hosting(&self, registry: &Registry) -> LocalRegistryHostingV1 {
        LocalRegistryHostingV1 {
            host: host_address(registry),
            host_from_container_runtime: Some(network_address(registry)),
            host_from_cluster_network: Some(network_address(registry)),
            help: Some(registry_constants::MINIKUBE_HELP.to_string()),
        }
    }
}
