// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Machine controller: reconciles the container engine and Docker Desktop.
//!
//! Docker Desktop keeps its Kubernetes toggle and CPU allocation in a private
//! settings store rather than in any cluster, so they are reconciled here,
//! before the controller looks at Kubernetes at all. All settings writes go
//! through [`MachineController::write_settings`], which counts them.

use crate::engine::{DesktopClient, EngineClient};
use crate::error::{DevclusterError, Result};
use crate::retry::{PollError, Poller};
use crate::types::{Cluster, Product};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// `OperatingSystem` the engine reports when it runs inside Docker Desktop
const DOCKER_DESKTOP_OS: &str = "Docker Desktop";

pub struct MachineController {
    engine: Arc<dyn EngineClient>,
    desktop: Arc<dyn DesktopClient>,
    has_desktop_settings: bool,
    poller: Poller,
    settings_writes: AtomicUsize,
}

impl MachineController {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        desktop: Arc<dyn DesktopClient>,
        has_desktop_settings: bool,
        poller: Poller,
    ) -> Self {
        Self {
            engine,
            desktop,
            has_desktop_settings,
            poller,
            settings_writes: AtomicUsize::new(0),
        }
    }

    /// Number of desktop settings writes issued so far
    pub fn settings_writes(&self) -> usize {
        self.settings_writes.load(Ordering::SeqCst)
    }

    /// CPUs the engine currently reports
    pub async fn engine_cpus(&self) -> Result<u32> {
        Ok(self.engine.info().await?.ncpu)
    }

    /// Make sure the container engine answers, starting Docker Desktop if
    /// this platform has it.
    #[instrument(skip(self))]
    pub async fn ensure_exists(&self) -> Result<()> {
        if self.engine.server_version().await.is_ok() {
            debug!("Container engine is running");
            return Ok(());
        }

        if !self.has_desktop_settings {
            return Err(DevclusterError::EngineUnavailable(
                "Not connected to Docker Engine. Please start it".to_string(),
            ));
        }

        warn!("Docker Desktop not running. Attempting to start it");
        self.desktop.start().await?;
        self.wait_for_engine(0).await?;
        info!("Docker Desktop started");
        Ok(())
    }

    /// Bring the engine in line with `desired`.
    ///
    /// Kubernetes is only switched on for the docker-desktop product. For
    /// other products the engine's own CPU count is checked first, and the
    /// desktop settings are only touched when CPUs must be raised on an
    /// engine that reports itself as Docker Desktop. CPU allocation is never
    /// lowered.
    #[instrument(skip(self, desired), fields(cluster = %desired.name, product = %desired.product))]
    pub async fn reconcile(&self, desired: &Cluster) -> Result<()> {
        if desired.product == Product::DockerDesktop {
            if !self.has_desktop_settings {
                return Err(DevclusterError::NotSupported(
                    "docker-desktop Kubernetes on a platform without Docker Desktop settings"
                        .to_string(),
                ));
            }
            return self.reconcile_desktop(desired.min_cpus, true).await;
        }

        let info = self.engine.info().await?;
        if info.ncpu >= desired.min_cpus {
            debug!(ncpu = info.ncpu, "Engine has enough CPUs");
            return Ok(());
        }
        if !self.has_desktop_settings || info.operating_system != DOCKER_DESKTOP_OS {
            return Err(DevclusterError::InvalidSettings(format!(
                "Cannot automatically set minimum CPU to {} on this platform",
                desired.min_cpus
            )));
        }
        self.reconcile_desktop(desired.min_cpus, false).await
    }

    /// Switch Docker Desktop's Kubernetes on, if it is off, and wait for the
    /// engine to come back
    pub async fn enable_kubernetes(&self) -> Result<()> {
        self.reconcile_desktop(0, true).await
    }

    async fn reconcile_desktop(&self, min_cpus: u32, enable_k8s: bool) -> Result<()> {
        let mut settings = self.desktop.settings().await?;
        let k8s_changed = enable_k8s && settings.ensure_k8s_enabled();
        let cpu_changed = settings.ensure_min_cpus(min_cpus)?;

        if !k8s_changed && !cpu_changed {
            debug!("Docker Desktop settings already satisfied");
            return Ok(());
        }

        self.write_settings(&settings).await?;
        self.wait_for_engine(min_cpus).await?;
        info!(k8s_changed, cpu_changed, "Docker Desktop reconfigured");
        Ok(())
    }

    /// Switch Docker Desktop's Kubernetes off, if it is on
    pub async fn disable_kubernetes(&self) -> Result<()> {
        if !self.has_desktop_settings {
            return Ok(());
        }
        let mut settings = self.desktop.settings().await?;
        if !settings.set_k8s_enabled(false) {
            return Ok(());
        }
        self.write_settings(&settings).await?;
        self.wait_for_engine(0).await
    }

    pub async fn reset_kubernetes(&self) -> Result<()> {
        self.desktop.reset_kubernetes().await
    }

    async fn write_settings(&self, settings: &crate::engine::DesktopSettings) -> Result<()> {
        self.desktop.write_settings(settings).await?;
        self.settings_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Writing settings restarts the engine; wait until it is back with
    /// enough CPUs.
    async fn wait_for_engine(&self, min_cpus: u32) -> Result<()> {
        let engine = &self.engine;
        let result = self
            .poller
            .poll("container engine", || async move {
                engine.server_version().await?;
                let info = engine.info().await?;
                if info.ncpu < min_cpus {
                    return Err(DevclusterError::EngineUnavailable(format!(
                        "engine reports {} CPUs, waiting for {}",
                        info.ncpu, min_cpus
                    )));
                }
                Ok(())
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(PollError::Cancelled) => Err(DevclusterError::Cancelled(
                "waiting for the container engine".to_string(),
            )),
            Err(PollError::Exhausted { attempts, last }) => {
                Err(DevclusterError::EngineUnavailable(format!(
                    "timed out waiting for Docker to start after {} attempts: {}",
                    attempts, last
                )))
            }
        }
    }
}
