// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::admin::{ensure_tool, host_address, Admin};
use crate::constants::tools;
use crate::error::{DevclusterError, Result};
use crate::kubernetes::contexts::find_context;
use crate::kubernetes::{ClientLoader, ContextStore};
use crate::machine::MachineController;
use crate::retry::{PollError, Poller};
use crate::types::{Cluster, LocalRegistryHostingV1, Registry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Docker Desktop's built-in Kubernetes.
///
/// The cluster is switched on through the desktop settings. Creating one
/// makes sure the toggle is on, then waits for Docker Desktop to write its
/// kubeconfig context and for the API server behind it to answer.
pub struct DockerDesktopAdmin {
    machine: Arc<MachineController>,
    contexts: Arc<dyn ContextStore>,
    loader: Arc<dyn ClientLoader>,
    poller: Poller,
}

impl DockerDesktopAdmin {
    pub fn new(
        machine: Arc<MachineController>,
        contexts: Arc<dyn ContextStore>,
        loader: Arc<dyn ClientLoader>,
        poller: Poller,
    ) -> Self {
        Self {
            machine,
            contexts,
            loader,
            poller,
        }
    }

    /// The context is recorded and its API server reports a version
    async fn api_ready(&self, name: &str) -> Result<()> {
        let kubeconfig = self.contexts.load()?;
        if find_context(&kubeconfig, name).is_none() {
            return Err(DevclusterError::cluster_not_found(name));
        }
        let client = self.loader.load(&kubeconfig, name).await?;
        let version = client.apiserver_version().await?;
        debug!("API server of {} answers with {}", name, version.git_version);
        Ok(())
    }
}

#[async_trait]
impl Admin for DockerDesktopAdmin {
    async fn ensure_installed(&self) -> Result<()> {
        ensure_tool(tools::DOCKER, tools::DOCKER_DESKTOP_HELP)
    }

    #[instrument(skip(self, desired, _registry), fields(cluster = %desired.name))]
    async fn create(&self, desired: &Cluster, _registry: Option<&Registry>) -> Result<()> {
        let name = desired.name.as_str();
        self.machine.enable_kubernetes().await?;

        let result = self
            .poller
            .poll("docker-desktop API server", || self.api_ready(name))
            .await;

        match result {
            Ok(()) => {
                info!("Docker Desktop Kubernetes {} is ready", name);
                Ok(())
            }
            Err(PollError::Cancelled) => Err(DevclusterError::Cancelled(format!(
                "waiting for context {}",
                name
            ))),
            Err(PollError::Exhausted { last, .. }) => Err(DevclusterError::EngineUnavailable(
                format!("Docker Desktop did not start Kubernetes: {}", last),
            )),
        }
    }

    #[instrument(skip(self, cluster), fields(cluster = %cluster.name))]
    async fn delete(&self, cluster: &Cluster) -> Result<()> {
        self.machine.reset_kubernetes().await?;
        self.machine.disable_kubernetes().await?;
        self.contexts.remove_context(&cluster.name)?;
        Ok(())
    }

    /// The cluster shares the host's engine, so one address serves everyone
    fn local_registry_hosting(&self, registry: &Registry) -> LocalRegistryHostingV1 {
        LocalRegistryHostingV1 {
            host: host_address(registry),
            ..Default::default()
        }
    }
}
