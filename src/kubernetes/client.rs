// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-context client creation and caching

use crate::error::{DevclusterError, Result};
use crate::kubernetes::contexts::fingerprint;
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Builds a client for one kubeconfig context
#[async_trait]
pub trait ClientLoader: Send + Sync {
    async fn load(&self, kubeconfig: &Kubeconfig, context: &str) -> Result<Client>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KubeconfigClientLoader;

#[async_trait]
impl ClientLoader for KubeconfigClientLoader {
    async fn load(&self, kubeconfig: &Kubeconfig, context: &str) -> Result<Client> {
        let options = KubeConfigOptions {
            context: Some(context.to_owned()),
            ..Default::default()
        };

        let config = KConfig::from_custom_kubeconfig(kubeconfig.clone(), &options)
            .await
            .map_err(|e| {
                DevclusterError::Kubeconfig(format!(
                    "Failed to create config for context {}: {}",
                    context, e
                ))
            })?;

        Client::try_from(config)
            .map_err(|e| DevclusterError::Kubeconfig(format!("Failed to create client: {}", e)))
    }
}

struct CachedClient {
    fingerprint: String,
    client: Client,
}

/// One client per context name, built on first use.
///
/// An entry is reused only while the context's fingerprint is unchanged, so
/// a context that was recreated with a new server gets a fresh client.
pub struct ClientCache {
    loader: Arc<dyn ClientLoader>,
    clients: Mutex<HashMap<String, CachedClient>>,
}

impl ClientCache {
    pub fn new(loader: Arc<dyn ClientLoader>) -> Self {
        Self {
            loader,
            clients: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self, kubeconfig))]
    pub async fn client(&self, kubeconfig: &Kubeconfig, name: &str) -> Result<Client> {
        let fingerprint =
            fingerprint(kubeconfig, name).ok_or_else(|| DevclusterError::cluster_not_found(name))?;

        let mut clients = self.clients.lock().await;
        if let Some(cached) = clients.get(name) {
            if cached.fingerprint == fingerprint {
                return Ok(cached.client.clone());
            }
            debug!("Context {} changed, rebuilding client", name);
        }

        let client = self.loader.load(kubeconfig, name).await?;
        clients.insert(
            name.to_string(),
            CachedClient {
                fingerprint,
                client: client.clone(),
            },
        );
        Ok(client)
    }

    /// Forget the client for `name`
    pub async fn evict(&self, name: &str) {
        if self.clients.lock().await.remove(name).is_some() {
            debug!("Evicted cached client for {}", name);
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
