// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster controller: compares desired clusters against what the kubeconfig
//! and the clusters themselves report, and drives the product backends.
//!
//! An apply walks through the [`ApplyStage`]s in order. Every stage observes
//! first and only acts when the observed state falls short, so re-running an
//! apply after a failure picks up where the previous one stopped.

mod list;

use crate::admin::{Admin, AdminMap};
use crate::error::{DevclusterError, Result};
use crate::kubernetes::{publish_local_registry_hosting, ClientCache, ClientLoader, ContextStore};
use crate::machine::MachineController;
use crate::registry::RegistryCoordinator;
use crate::types::{Cluster, Product, Registry};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Span};

/// Steps of an apply, in the order they complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApplyStage {
    ToolInstalled,
    EngineReady,
    RegistryReady,
    ClusterExists,
    StatusPopulated,
}

impl fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApplyStage::ToolInstalled => "tool installed",
            ApplyStage::EngineReady => "engine ready",
            ApplyStage::RegistryReady => "registry ready",
            ApplyStage::ClusterExists => "cluster exists",
            ApplyStage::StatusPopulated => "status populated",
        };
        f.write_str(s)
    }
}

/// Where user-facing progress messages go
#[derive(Clone)]
pub struct MessageSink(Arc<Mutex<Box<dyn Write + Send>>>);

impl MessageSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(writer))))
    }

    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    pub fn write(&self, message: &str) {
        info!("{}", message);
        let Ok(mut writer) = self.0.lock() else {
            return;
        };
        if let Err(e) = writeln!(writer, "{}", message) {
            debug!("Failed to write message: {}", e);
        }
    }
}

pub struct Controller {
    admins: AdminMap,
    machine: Arc<MachineController>,
    registries: Arc<dyn RegistryCoordinator>,
    contexts: Arc<dyn ContextStore>,
    clients: ClientCache,
    messages: MessageSink,
    progress: Mutex<HashMap<String, (Product, ApplyStage)>>,
    cancel: CancellationToken,
}

impl Controller {
    pub fn new(
        admins: AdminMap,
        machine: Arc<MachineController>,
        registries: Arc<dyn RegistryCoordinator>,
        contexts: Arc<dyn ContextStore>,
        loader: Arc<dyn ClientLoader>,
    ) -> Self {
        Self {
            admins,
            machine,
            registries,
            contexts,
            clients: ClientCache::new(loader),
            messages: MessageSink::stderr(),
            progress: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_messages(mut self, messages: MessageSink) -> Self {
        self.messages = messages;
        self
    }

    /// Share a cancellation token, typically the one the pollers watch
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Last apply stage completed for `name`
    pub fn progress(&self, name: &str) -> Option<ApplyStage> {
        self.progress
            .lock()
            .ok()
            .and_then(|p| p.get(name).map(|(_, stage)| *stage))
    }

    /// An earlier apply of the same product stopped part way
    fn resuming(&self, name: &str, product: Product) -> bool {
        self.progress
            .lock()
            .ok()
            .and_then(|p| p.get(name).copied())
            .is_some_and(|(p, stage)| p == product && stage < ApplyStage::StatusPopulated)
    }

    fn advance(&self, desired: &Cluster, stage: ApplyStage) {
        debug!("Cluster {} reached stage: {}", desired.name, stage);
        if let Ok(mut progress) = self.progress.lock() {
            progress.insert(desired.name.clone(), (desired.product, stage));
        }
    }

    fn forget_progress(&self, name: &str) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.remove(name);
        }
    }

    fn check_cancelled(&self, next: ApplyStage) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DevclusterError::Cancelled(format!("waiting for {}", next)));
        }
        Ok(())
    }

    fn admin(&self, product: Product) -> Result<Arc<dyn Admin>> {
        self.admins.get(&product).cloned().ok_or_else(|| {
            DevclusterError::NotSupported(format!("{:?}", product.as_str()))
        })
    }

    /// Bring the cluster named by `desired` into the desired state and return
    /// it as observed.
    #[instrument(skip(self, desired), fields(cluster = tracing::field::Empty, product = %desired.product))]
    pub async fn apply(&self, desired: &Cluster) -> Result<Cluster> {
        let mut desired = desired.clone();
        desired.fill_defaults();
        let admin = self.admin(desired.product)?;
        let name = desired.name.clone();
        Span::current().record("cluster", name.as_str());

        if self.resuming(&name, desired.product) {
            debug!("Tooling for {} already verified", desired.product);
        } else {
            admin.ensure_installed().await?;
        }
        self.advance(&desired, ApplyStage::ToolInstalled);

        self.check_cancelled(ApplyStage::EngineReady)?;
        if desired.product.uses_container_engine() {
            self.machine.ensure_exists().await?;
            self.machine.reconcile(&desired).await?;
        }
        self.advance(&desired, ApplyStage::EngineReady);

        self.check_cancelled(ApplyStage::RegistryReady)?;
        let registry = match &desired.registry {
            Some(registry_name) => Some(self.registries.apply(&Registry::new(registry_name)).await?),
            None => None,
        };
        self.advance(&desired, ApplyStage::RegistryReady);

        self.check_cancelled(ApplyStage::ClusterExists)?;
        let needs_create = match self.observe(&name).await? {
            None => true,
            Some(observed) => match recreate_reason(&desired, &observed, registry.as_ref()) {
                Some(reason) => {
                    self.messages.write(&reason);
                    let owner = match observed.product {
                        Product::Unknown => admin.clone(),
                        product => self.admin(product)?,
                    };
                    owner.delete(&observed).await?;
                    self.clients.evict(&name).await;
                    true
                }
                None => {
                    debug!("Cluster {} already matches", name);
                    false
                }
            },
        };

        if needs_create {
            self.create(admin.as_ref(), &desired, registry.as_ref()).await?;
        }
        self.advance(&desired, ApplyStage::ClusterExists);

        let mut cluster = self.get(&name).await?;
        cluster.min_cpus = desired.min_cpus;
        cluster.kubernetes_version = desired.kubernetes_version.clone();
        if let Some(registry) = &registry {
            cluster.registry = Some(registry.name.clone());
            cluster.status.local_registry_hosting = Some(admin.local_registry_hosting(registry));
        }
        self.advance(&desired, ApplyStage::StatusPopulated);
        Ok(cluster)
    }

    async fn observe(&self, name: &str) -> Result<Option<Cluster>> {
        match self.get(name).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(
        &self,
        admin: &dyn Admin,
        desired: &Cluster,
        registry: Option<&Registry>,
    ) -> Result<()> {
        admin.create(desired, registry).await?;
        self.clients.evict(&desired.name).await;

        if let Some(registry) = registry {
            let kubeconfig = self.contexts.load()?;
            let client = self.clients.client(&kubeconfig, &desired.name).await?;
            publish_local_registry_hosting(&client, &admin.local_registry_hosting(registry))
                .await?;
        }

        info!("Cluster {} created", desired.name);
        Ok(())
    }

    /// Delete the cluster `name` through its product's backend
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<()> {
        let cluster = self.get(name).await?;
        let admin = self.admin(cluster.product)?;

        admin.delete(&cluster).await?;
        self.clients.evict(name).await;
        self.forget_progress(name);

        info!("Cluster {} deleted", name);
        Ok(())
    }
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Why an existing cluster has to be replaced, as shown to the user.
///
/// A registry is only wired in at creation, so a cluster that does not
/// advertise the desired registry has to be recreated.
fn recreate_reason(
    desired: &Cluster,
    observed: &Cluster,
    registry: Option<&Registry>,
) -> Option<String> {
    if observed.product != Product::Unknown && observed.product != desired.product {
        return Some(format!(
            "Deleting cluster {} because desired product ({}) does not match current ({})",
            desired.name, desired.product, observed.product
        ));
    }

    let status_read = observed.observed_version().is_some();
    if let (Some(registry), true) = (registry, status_read) {
        if observed.registry.as_deref() != Some(registry.name.as_str()) {
            return Some(format!(
                "Deleting cluster {} because desired registry ({}) does not match current ({})",
                desired.name,
                registry.name,
                observed.registry.as_deref().unwrap_or("none")
            ));
        }
    }

    match (desired.kubernetes_version.as_deref(), observed.observed_version()) {
        (Some(want), Some(have)) if strip_v(want) != strip_v(have) => Some(format!(
            "Deleting cluster {} because desired Kubernetes version ({}) does not match current ({})",
            desired.name, want, have
        )),
        (Some(_), None) => {
            warn!(
                "Kubernetes version of {} is unknown, leaving it in place",
                desired.name
            );
            None
        }
        _ => None,
    }
}
