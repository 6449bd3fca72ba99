// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Docker Desktop's private settings API

use crate::engine::socket::SocketEndpoint;
use crate::error::{DevclusterError, Result};
use crate::process::{args, CommandRunner};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, instrument};

const KEY_CPU: &str = "cpu";
const KEY_CPU_MAX: &str = "cpuMax";
const KEY_K8S_ENABLED: &str = "k8sEnabled";

const SETTINGS_URI: &str = "/app/settings";
const RESET_K8S_URI: &str = "/kubernetes/reset";

/// Flat view of the desktop settings this crate reconciles.
///
/// Keys: `cpu` (integer), `k8sEnabled` (bool) and, when the desktop
/// advertises one, `cpuMax` (integer).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DesktopSettings(Map<String, Value>);

impl DesktopSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cpus(mut self, cpus: u32) -> Self {
        self.0.insert(KEY_CPU.to_string(), json!(cpus));
        self
    }

    pub fn with_cpu_max(mut self, max: u32) -> Self {
        self.0.insert(KEY_CPU_MAX.to_string(), json!(max));
        self
    }

    pub fn with_k8s_enabled(mut self, enabled: bool) -> Self {
        self.0.insert(KEY_K8S_ENABLED.to_string(), json!(enabled));
        self
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn cpus(&self) -> Option<u32> {
        self.get_u32(KEY_CPU)
    }

    pub fn cpu_max(&self) -> Option<u32> {
        self.get_u32(KEY_CPU_MAX)
    }

    pub fn k8s_enabled(&self) -> bool {
        self.0
            .get(KEY_K8S_ENABLED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Turn Kubernetes on. Returns whether the settings changed.
    pub fn ensure_k8s_enabled(&mut self) -> bool {
        self.set_k8s_enabled(true)
    }

    pub fn set_k8s_enabled(&mut self, desired: bool) -> bool {
        if self.k8s_enabled() == desired {
            return false;
        }
        self.0.insert(KEY_K8S_ENABLED.to_string(), json!(desired));
        true
    }

    /// Raise the CPU allocation to at least `desired`; never lowers it.
    /// Returns whether the settings changed.
    pub fn ensure_min_cpus(&mut self, desired: u32) -> Result<bool> {
        if self.cpus().is_some_and(|current| current >= desired) {
            return Ok(false);
        }
        if let Some(max) = self.cpu_max() {
            if desired > max {
                return Err(DevclusterError::InvalidSettings(format!(
                    "desired cpus ({}) greater than max allowed ({})",
                    desired, max
                )));
            }
        }
        self.0.insert(KEY_CPU.to_string(), json!(desired));
        Ok(true)
    }

    fn get_u32(&self, key: &str) -> Option<u32> {
        self.0
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Read the desktop's nested settings document
    pub(crate) fn from_backend(doc: &Value) -> Result<Self> {
        let cpus = doc
            .pointer("/vm/resources/cpus")
            .ok_or_else(|| missing_setting("vm.resources.cpus"))?;
        let enabled = doc
            .pointer("/vm/kubernetes/enabled/value")
            .and_then(Value::as_bool)
            .ok_or_else(|| missing_setting("vm.kubernetes.enabled"))?;

        let mut settings = Self::new().with_k8s_enabled(enabled);
        if let Some(value) = cpus.get("value").and_then(Value::as_u64) {
            settings = settings.with_cpus(u32::try_from(value).unwrap_or(u32::MAX));
        }
        if let Some(max) = cpus.get("max").and_then(Value::as_u64) {
            settings = settings.with_cpu_max(u32::try_from(max).unwrap_or(u32::MAX));
        }
        Ok(settings)
    }

    /// The nested document the desktop accepts on write
    pub(crate) fn to_backend(&self) -> Value {
        let mut vm = Map::new();
        if let Some(cpus) = self.cpus() {
            vm.insert(
                "resources".to_string(),
                json!({ "cpus": { "value": cpus } }),
            );
        }
        vm.insert(
            "kubernetes".to_string(),
            json!({ "enabled": { "value": self.k8s_enabled() } }),
        );
        json!({ "vm": vm })
    }
}

fn missing_setting(path: &str) -> DevclusterError {
    DevclusterError::InvalidSettings(format!("desktop settings have no {}", path))
}

/// Control plane of the desktop virtualization product
#[async_trait]
pub trait DesktopClient: Send + Sync {
    async fn settings(&self) -> Result<DesktopSettings>;
    async fn write_settings(&self, settings: &DesktopSettings) -> Result<()>;
    /// Launch the product; returns once the launch was requested
    async fn start(&self) -> Result<()>;
    /// Throw away the product's Kubernetes cluster
    async fn reset_kubernetes(&self) -> Result<()>;
}

pub struct DockerDesktopClient {
    endpoint: Option<SocketEndpoint>,
    os: String,
    runner: Arc<dyn CommandRunner>,
}

impl DockerDesktopClient {
    pub fn new(
        socket: Option<std::path::PathBuf>,
        os: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            endpoint: socket.map(SocketEndpoint::new),
            os: os.into(),
            runner,
        }
    }

    fn endpoint(&self) -> Result<&SocketEndpoint> {
        self.endpoint.as_ref().ok_or_else(|| {
            DevclusterError::EngineUnavailable(format!(
                "Docker Desktop settings are not reachable on {}",
                self.os
            ))
        })
    }
}

#[async_trait]
impl DesktopClient for DockerDesktopClient {
    async fn settings(&self) -> Result<DesktopSettings> {
        let doc: Value = self.endpoint()?.get_json(SETTINGS_URI).await?;
        DesktopSettings::from_backend(&doc)
    }

    #[instrument(skip(self, settings))]
    async fn write_settings(&self, settings: &DesktopSettings) -> Result<()> {
        info!(
            cpus = ?settings.cpus(),
            k8s_enabled = settings.k8s_enabled(),
            "Writing Docker Desktop settings"
        );
        self.endpoint()?
            .post_json(SETTINGS_URI, &settings.to_backend())
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn start(&self) -> Result<()> {
        info!("Starting Docker Desktop");
        let (program, argv) = match self.os.as_str() {
            "macos" | "darwin" => ("open", args(["-a", "Docker"])),
            "windows" => (
                "cmd",
                args([
                    "/C",
                    "start",
                    "",
                    r"C:\Program Files\Docker\Docker\Docker Desktop.exe",
                ]),
            ),
            "linux" => ("systemctl", args(["--user", "start", "docker-desktop"])),
            other => {
                return Err(DevclusterError::NotSupported(format!(
                    "starting Docker Desktop on {}",
                    other
                )))
            }
        };
        self.runner.run(program, &argv, None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn reset_kubernetes(&self) -> Result<()> {
        info!("Resetting Docker Desktop Kubernetes cluster");
        self.endpoint()?
            .post_json(RESET_K8S_URI, &Value::Object(Map::new()))
            .await?;
        Ok(())
    }
}
