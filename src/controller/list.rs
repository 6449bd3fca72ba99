// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::Controller;
use crate::error::{DevclusterError, Result};
use crate::kubernetes::{product_from_context, read_local_registry_hosting};
use crate::selector::{FieldSelector, ListOptions};
use crate::types::{Cluster, ClusterList, ClusterStatus};
use futures::future::join_all;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::config::Kubeconfig;
use kube::Api;
use tracing::{debug, instrument, warn};

const SELECTOR_FIELDS: &[&str] = &["name", "product"];

impl Controller {
    /// One cluster per kubeconfig context, sorted by name.
    ///
    /// Status is read from every cluster concurrently. A cluster that cannot
    /// be read is logged and listed with an empty status.
    #[instrument(skip(self))]
    pub async fn list(&self, options: &ListOptions) -> Result<ClusterList> {
        let selector = FieldSelector::from_options(options, SELECTOR_FIELDS)?;
        let clusters = self
            .collect(|cluster| {
                selector.matches(|field| match field {
                    "name" => Some(cluster.name.as_str()),
                    "product" => Some(cluster.product.as_str()),
                    _ => None,
                })
            })
            .await?;
        Ok(ClusterList::new(clusters))
    }

    pub async fn get(&self, name: &str) -> Result<Cluster> {
        self.collect(|cluster| cluster.name == name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DevclusterError::cluster_not_found(name))
    }

    /// Clusters for the recorded contexts `keep` accepts, with status
    async fn collect(&self, keep: impl Fn(&Cluster) -> bool) -> Result<Vec<Cluster>> {
        let kubeconfig = self.contexts.load()?;
        let current = kubeconfig.current_context.as_deref();

        let mut clusters: Vec<Cluster> = kubeconfig
            .contexts
            .iter()
            .map(|context| Cluster::named(context.name.as_str(), product_from_context(context)))
            .filter(|cluster| keep(cluster))
            .collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));

        let kubeconfig = &kubeconfig;
        let mut clusters = join_all(clusters.into_iter().map(|mut cluster| async move {
            match self.observe_status(kubeconfig, &cluster.name).await {
                Ok(status) => cluster.status = status,
                Err(e) => warn!(cluster = %cluster.name, error = %e, "Failed to read cluster status"),
            }
            cluster
        }))
        .await;

        for cluster in clusters.iter_mut() {
            cluster.status.current = current == Some(cluster.name.as_str());
        }
        self.attach_engine_cpus(&mut clusters).await;
        self.attach_registries(&mut clusters).await;

        Ok(clusters)
    }

    async fn observe_status(&self, kubeconfig: &Kubeconfig, name: &str) -> Result<ClusterStatus> {
        let client = self.clients.client(kubeconfig, name).await?;

        let nodes: Api<Node> = Api::all(client.clone());
        let creation_timestamp = nodes
            .list(&ListParams::default())
            .await?
            .items
            .into_iter()
            .filter_map(|node| node.metadata.creation_timestamp)
            .min();

        let version = client.apiserver_version().await?;
        let local_registry_hosting = read_local_registry_hosting(&client).await?;

        Ok(ClusterStatus {
            creation_timestamp,
            kubernetes_version: Some(version.git_version),
            local_registry_hosting,
            ..Default::default()
        })
    }

    async fn attach_engine_cpus(&self, clusters: &mut [Cluster]) {
        if !clusters.iter().any(|c| c.product.uses_container_engine()) {
            return;
        }
        let cpus = match self.machine.engine_cpus().await {
            Ok(cpus) => cpus,
            Err(e) => {
                debug!("Engine CPU count unavailable: {}", e);
                return;
            }
        };
        for cluster in clusters
            .iter_mut()
            .filter(|c| c.product.uses_container_engine())
        {
            cluster.status.cpus = Some(cpus);
        }
    }

    /// Name the registry each cluster advertises by matching host ports
    async fn attach_registries(&self, clusters: &mut [Cluster]) {
        if clusters
            .iter()
            .all(|c| c.status.local_registry_hosting.is_none())
        {
            return;
        }
        let registries = match self.registries.list(&ListOptions::default()).await {
            Ok(list) => list.items,
            Err(e) => {
                debug!("Registries unavailable: {}", e);
                return;
            }
        };

        for cluster in clusters.iter_mut() {
            let Some(port) = cluster
                .status
                .local_registry_hosting
                .as_ref()
                .and_then(|h| h.host_port())
            else {
                continue;
            };
            cluster.registry = registries
                .iter()
                .find(|r| r.status.host_port == port)
                .map(|r| r.name.clone());
        }
    }
}
