// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubeconfig contexts: loading, product inference and fingerprints

use crate::error::{DevclusterError, Result};
use crate::types::Product;
use kube::config::{Kubeconfig, NamedContext};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const KUBECONFIG_ENV_VAR: &str = "KUBECONFIG";
/// Extension minikube attaches to the contexts it writes
const MINIKUBE_EXTENSION: &str = "context_info";
const MINIKUBE_PROVIDER: &str = "minikube.sigs.k8s.io";

/// Source of recorded contexts
pub trait ContextStore: Send + Sync {
    fn load(&self) -> Result<Kubeconfig>;

    /// Drop `name` together with the cluster and user entries only it uses.
    /// Returns false when no such context is recorded.
    fn remove_context(&self, name: &str) -> Result<bool>;
}

/// Reads the kubeconfig the way kubectl does
#[derive(Debug, Default, Clone)]
pub struct KubeconfigStore {
    path: Option<PathBuf>,
}

impl KubeconfigStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Files the merged kubeconfig is read from, in precedence order
    fn files(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.path {
            return vec![path.clone()];
        }
        if let Some(paths) = env::var_os(KUBECONFIG_ENV_VAR) {
            return env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        home::home_dir()
            .map(|d| vec![d.join(".kube").join("config")])
            .unwrap_or_default()
    }
}

fn read_file(path: &Path) -> Result<Kubeconfig> {
    Kubeconfig::read_from(path).map_err(|e| DevclusterError::Kubeconfig(e.to_string()))
}

impl ContextStore for KubeconfigStore {
    fn load(&self) -> Result<Kubeconfig> {
        let result = match &self.path {
            Some(path) => Kubeconfig::read_from(path),
            None if env::var_os(KUBECONFIG_ENV_VAR).is_some() => Kubeconfig::read(),
            None => {
                let Some(default_path) = home::home_dir().map(|d| d.join(".kube").join("config"))
                else {
                    return Ok(Kubeconfig::default());
                };
                if !default_path.exists() {
                    debug!("No kubeconfig at {}, starting empty", default_path.display());
                    return Ok(Kubeconfig::default());
                }
                Kubeconfig::read_from(&default_path)
            }
        };
        result.map_err(|e| DevclusterError::Kubeconfig(e.to_string()))
    }

    fn remove_context(&self, name: &str) -> Result<bool> {
        for path in self.files() {
            if !path.exists() {
                continue;
            }
            let mut kubeconfig = read_file(&path)?;
            if !remove_entries(&mut kubeconfig, name) {
                continue;
            }
            let contents = serde_yaml::to_string(&kubeconfig)?;
            std::fs::write(&path, contents).map_err(|e| {
                DevclusterError::Kubeconfig(format!("writing {}: {}", path.display(), e))
            })?;
            info!("Removed context {} from {}", name, path.display());
            return Ok(true);
        }
        Ok(false)
    }
}

/// Remove context `name` from `kubeconfig`, plus its cluster and user when no
/// other context refers to them
pub fn remove_entries(kubeconfig: &mut Kubeconfig, name: &str) -> bool {
    let Some(index) = kubeconfig.contexts.iter().position(|c| c.name == name) else {
        return false;
    };
    let removed = kubeconfig.contexts.remove(index);

    if let Some(context) = removed.context {
        let (cluster_used, user_used) = {
            let remaining = kubeconfig.contexts.iter().filter_map(|c| c.context.as_ref());
            remaining.fold((false, false), |(cluster, user), c| {
                (cluster || c.cluster == context.cluster, user || c.user == context.user)
            })
        };

        if !cluster_used {
            kubeconfig.clusters.retain(|c| c.name != context.cluster);
        }
        if let (Some(user), false) = (&context.user, user_used) {
            kubeconfig.auth_infos.retain(|a| &a.name != user);
        }
    }

    if kubeconfig.current_context.as_deref() == Some(name) {
        kubeconfig.current_context = None;
    }
    true
}

fn written_by_minikube(context: &kube::config::Context) -> bool {
    context.extensions.iter().flatten().any(|ext| {
        ext.name == MINIKUBE_EXTENSION
            && ext.extension.get("provider").and_then(|p| p.as_str()) == Some(MINIKUBE_PROVIDER)
    })
}

/// Infer which product created a context from its cluster name, or from the
/// extension minikube stamps on the profiles it writes
pub fn product_from_context(context: &NamedContext) -> Product {
    let Some(inner) = context.context.as_ref() else {
        return Product::Unknown;
    };
    let cluster = inner.cluster.as_str();

    if cluster == "docker-desktop" || cluster == "docker-for-desktop-cluster" {
        Product::DockerDesktop
    } else if written_by_minikube(inner) {
        Product::Minikube
    } else if cluster.starts_with("microk8s-cluster") {
        Product::MicroK8s
    } else if cluster.starts_with("minikube") {
        Product::Minikube
    } else if cluster.starts_with("kind-") {
        Product::Kind
    } else {
        Product::Unknown
    }
}

pub fn find_context<'a>(kubeconfig: &'a Kubeconfig, name: &str) -> Option<&'a NamedContext> {
    kubeconfig.contexts.iter().find(|c| c.name == name)
}

/// Identity of a context's resolved connection parameters.
///
/// Two kubeconfigs give the same fingerprint for `name` only when the
/// context entry and the cluster entry it points at are identical.
pub fn fingerprint(kubeconfig: &Kubeconfig, name: &str) -> Option<String> {
    let context = find_context(kubeconfig, name)?;
    let cluster = context
        .context
        .as_ref()
        .and_then(|c| kubeconfig.clusters.iter().find(|nc| nc.name == c.cluster));
    serde_json::to_string(&(context, cluster)).ok()
}
