// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Local image registries running as containers on the engine

use crate::constants::{registry as registry_constants, tools};
use crate::error::{DevclusterError, Result};
use crate::process::{args, CommandRunner};
use crate::selector::{FieldSelector, ListOptions};
use crate::types::{Registry, RegistryList, RegistryStatus};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const SELECTOR_FIELDS: &[&str] = &["name"];

#[async_trait]
pub trait RegistryCoordinator: Send + Sync {
    /// Make sure the registry exists and is running; returns it as observed
    async fn apply(&self, desired: &Registry) -> Result<Registry>;
    async fn list(&self, options: &ListOptions) -> Result<RegistryList>;
    async fn get(&self, name: &str) -> Result<Registry>;
}

/// Manages registries with the docker CLI
pub struct DockerRegistryCoordinator {
    runner: Arc<dyn CommandRunner>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ContainerInspect {
    id: String,
    name: String,
    #[serde(default)]
    created: Option<Time>,
    state: ContainerState,
    network_settings: NetworkSettings,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ContainerState {
    running: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettings {
    #[serde(default)]
    networks: BTreeMap<String, EndpointSettings>,
    #[serde(default)]
    ports: BTreeMap<String, Option<Vec<PortBinding>>>,
}

#[derive(Deserialize, Debug)]
struct EndpointSettings {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

#[derive(Deserialize, Debug)]
struct PortBinding {
    #[serde(rename = "HostPort", default)]
    host_port: String,
}

impl ContainerInspect {
    fn into_registry(self) -> (Registry, bool) {
        let (container_port, host_port) = self
            .network_settings
            .ports
            .iter()
            .find_map(|(port, bindings)| {
                let container_port = port.split('/').next()?.parse::<u16>().ok()?;
                let host_port = bindings
                    .as_ref()?
                    .iter()
                    .find_map(|b| b.host_port.parse::<u16>().ok())?;
                Some((container_port, host_port))
            })
            .unwrap_or_default();

        let ip_address = self
            .network_settings
            .networks
            .get("bridge")
            .or_else(|| self.network_settings.networks.values().next())
            .map(|e| e.ip_address.clone())
            .unwrap_or_default();

        let mut registry = Registry::new(self.name.trim_start_matches('/'));
        registry.status = RegistryStatus {
            creation_timestamp: self.created,
            host_port,
            container_port,
            ip_address,
            container_id: self.id,
            networks: self.network_settings.networks.into_keys().collect(),
        };
        (registry, self.state.running)
    }
}

impl DockerRegistryCoordinator {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn docker(&self, argv: Vec<String>) -> Result<String> {
        self.runner.run(tools::DOCKER, &argv, None).await
    }

    /// Observe the container and whether it is running
    async fn inspect(&self, name: &str) -> Result<(Registry, bool)> {
        let output = match self
            .docker(args(["inspect", "--type", "container", name]))
            .await
        {
            Ok(output) => output,
            Err(DevclusterError::Command { message, .. }) if message.contains("No such") => {
                return Err(DevclusterError::registry_not_found(name));
            }
            Err(e) => return Err(e),
        };

        let containers: Vec<ContainerInspect> = serde_json::from_str(&output)?;
        containers
            .into_iter()
            .next()
            .map(ContainerInspect::into_registry)
            .ok_or_else(|| DevclusterError::registry_not_found(name))
    }

    async fn run_registry(&self, desired: &Registry) -> Result<()> {
        let host_port = match desired.status.host_port {
            0 => registry_constants::DEFAULT_HOST_PORT,
            port => port,
        };
        info!(host_port, "Creating registry {}", desired.name);
        self.docker(args([
            "run".to_string(),
            "-d".to_string(),
            "--restart=always".to_string(),
            "--name".to_string(),
            desired.name.clone(),
            "--label".to_string(),
            registry_constants::ROLE_LABEL.to_string(),
            "-p".to_string(),
            format!(
                "127.0.0.1:{}:{}",
                host_port,
                registry_constants::CONTAINER_PORT
            ),
            registry_constants::IMAGE.to_string(),
        ]))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RegistryCoordinator for DockerRegistryCoordinator {
    #[instrument(skip(self, desired), fields(registry = %desired.name))]
    async fn apply(&self, desired: &Registry) -> Result<Registry> {
        match self.inspect(&desired.name).await {
            Ok((registry, true)) => {
                debug!("Registry {} already running", desired.name);
                return Ok(registry);
            }
            Ok((_, false)) => {
                info!("Starting stopped registry {}", desired.name);
                self.docker(args(["start", desired.name.as_str()])).await?;
            }
            Err(e) if e.is_not_found() => self.run_registry(desired).await?,
            Err(e) => return Err(e),
        }

        self.get(&desired.name).await
    }

    async fn list(&self, options: &ListOptions) -> Result<RegistryList> {
        let selector = FieldSelector::from_options(options, SELECTOR_FIELDS)?;
        let filter = format!("label={}", registry_constants::ROLE_LABEL);
        let output = self
            .docker(args(["ps", "-a", "--filter", filter.as_str(), "--format", "{{.Names}}"]))
            .await?;

        let mut items = Vec::new();
        for name in output.lines().map(str::trim).filter(|n| !n.is_empty()) {
            if !selector.matches(|k| (k == "name").then_some(name)) {
                continue;
            }
            match self.inspect(name).await {
                Ok((registry, _)) => items.push(registry),
                // Removed between ps and inspect
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(RegistryList::new(items))
    }

    async fn get(&self, name: &str) -> Result<Registry> {
        Ok(self.inspect(name).await?.0)
    }
}
