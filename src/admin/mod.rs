// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Product-specific cluster backends.
//!
//! Each product that can host a local cluster gets one [`Admin`]. The
//! controller holds them in an [`AdminMap`] keyed by [`Product`], so adding a
//! backend means registering one more entry.

pub mod docker_desktop;
pub mod kind;
pub mod minikube;

pub use docker_desktop::DockerDesktopAdmin;
pub use kind::KindAdmin;
pub use minikube::MinikubeAdmin;

use crate::constants::tools;
use crate::error::{DevclusterError, Result};
use crate::kubernetes::{ClientLoader, ContextStore};
use crate::machine::MachineController;
use crate::process::{args, CommandRunner};
use crate::retry::Poller;
use crate::types::{Cluster, LocalRegistryHostingV1, Product, Registry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[async_trait]
pub trait Admin: Send + Sync {
    /// Fails with [`DevclusterError::NotInstalled`] when the product's tooling is missing
    async fn ensure_installed(&self) -> Result<()>;

    /// Create the cluster and record its kubeconfig context
    async fn create(&self, desired: &Cluster, registry: Option<&Registry>) -> Result<()>;

    /// Remove the cluster and its recorded context; absent clusters are not
    /// an error
    async fn delete(&self, cluster: &Cluster) -> Result<()>;

    /// How the cluster reaches `registry`
    fn local_registry_hosting(&self, registry: &Registry) -> LocalRegistryHostingV1;
}

pub type AdminMap = HashMap<Product, Arc<dyn Admin>>;

/// The backends available out of the box
pub fn default_admins(
    runner: Arc<dyn CommandRunner>,
    machine: Arc<MachineController>,
    contexts: Arc<dyn ContextStore>,
    loader: Arc<dyn ClientLoader>,
    poller: Poller,
) -> AdminMap {
    let mut admins: AdminMap = HashMap::new();
    admins.insert(
        Product::Kind,
        Arc::new(KindAdmin::new(runner.clone(), contexts.clone())),
    );
    admins.insert(
        Product::Minikube,
        Arc::new(MinikubeAdmin::new(runner, contexts.clone())),
    );
    admins.insert(
        Product::DockerDesktop,
        Arc::new(DockerDesktopAdmin::new(machine, contexts, loader, poller)),
    );
    admins
}

/// Look `tool` up on PATH
pub(crate) fn ensure_tool(tool: &str, help: &str) -> Result<()> {
    match which::which(tool) {
        Ok(path) => {
            debug!("Found {} at {}", tool, path.display());
            Ok(())
        }
        Err(_) => Err(DevclusterError::NotInstalled {
            tool: tool.to_string(),
            help: help.to_string(),
        }),
    }
}

/// Attach the registry container to a cluster's network unless it already is
pub(crate) async fn connect_registry(
    runner: &dyn CommandRunner,
    network: &str,
    registry: &Registry,
) -> Result<()> {
    if registry.is_on_network(network) {
        debug!("Registry {} already on network {}", registry.name, network);
        return Ok(());
    }
    info!("Connecting registry {} to network {}", registry.name, network);
    runner
        .run(
            tools::DOCKER,
            &args(["network", "connect", network, registry.name.as_str()]),
            None,
        )
        .await?;
    Ok(())
}

/// `localhost:<hostPort>`, the address the host pushes to
pub(crate) fn host_address(registry: &Registry) -> String {
    format!("localhost:{}", registry.status.host_port)
}

/// `<name>:<containerPort>`, the address on the container network
pub(crate) fn network_address(registry: &Registry) -> String {
    format!("{}:{}", registry.name, registry.status.container_port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{registry_on, RecordingRunner};

    #[test]
    fn test_missing_tool_is_not_installed() {
        let err = ensure_tool("devcluster-no-such-tool", "https://example.invalid").unwrap_err();
        match err {
            DevclusterError::NotInstalled { tool, help } => {
                assert_eq!(tool, "devcluster-no-such-tool");
                assert_eq!(help, "https://example.invalid");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_present_tool_is_found() {
        assert!(ensure_tool("sh", "").is_ok());
    }

    #[tokio::test]
    async fn test_connect_registry_skips_attached_network() {
        let runner = RecordingRunner::default();

        connect_registry(&runner, "kind", &registry_on("kind-registry", 5001, &["bridge", "kind"]))
            .await
            .unwrap();
        connect_registry(&runner, "minikube", &registry_on("kind-registry", 5001, &["bridge"]))
            .await
            .unwrap();

        assert_eq!(
            runner.commands(),
            vec!["docker network connect minikube kind-registry".to_string()]
        );
    }

    #[test]
    fn test_registry_addresses() {
        let registry = registry_on("kind-registry", 5001, &[]);
        assert_eq!(host_address(&registry), "localhost:5001");
        assert_eq!(network_address(&registry), "kind-registry:5000");
    }
}
