// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

pub const API_VERSION: &str = "ctlptl.dev/v1alpha1";
pub const CLUSTER_KIND: &str = "Cluster";
pub const CLUSTER_LIST_KIND: &str = "ClusterList";
pub const REGISTRY_KIND: &str = "Registry";
pub const REGISTRY_LIST_KIND: &str = "RegistryList";

/// The field manager used for server-side apply
pub const FIELD_MANAGER: &str = "devcluster";

/// Where clusters advertise their local registry (KEP-1755)
pub mod hosting {
    pub const NAMESPACE: &str = "kube-public";
    pub const CONFIG_MAP: &str = "local-registry-hosting";
    pub const DATA_KEY: &str = "localRegistryHosting.v1";
}

/// Engine and desktop polling configuration
pub mod polling {
    /// Attempts when waiting for the engine to (re)start
    pub const ATTEMPTS: u32 = 60;
    /// Fixed sleep between attempts, in seconds
    pub const INTERVAL_SECS: u64 = 1;
}

/// Docker engine socket used when DOCKER_HOST is unset
pub const DEFAULT_ENGINE_SOCKET: &str = "/var/run/docker.sock";

/// Native tools and where to get them
pub mod tools {
    pub const KIND: &str = "kind";
    pub const KIND_HELP: &str = "https://kind.sigs.k8s.io/docs/user/quick-start/";
    pub const MINIKUBE: &str = "minikube";
    pub const MINIKUBE_HELP: &str = "https://minikube.sigs.k8s.io/docs/start/";
    pub const DOCKER: &str = "docker";
    pub const DOCKER_DESKTOP_HELP: &str = "https://docs.docker.com/desktop/";
}

/// Registry containers managed on the local engine
pub mod registry {
    pub const IMAGE: &str = "registry:2";
    /// Label marking containers this crate runs as registries
    pub const ROLE_LABEL: &str = "dev.devcluster.role=registry";
    pub const CONTAINER_PORT: u16 = 5000;
    pub const DEFAULT_HOST_PORT: u16 = 5000;
    pub const KIND_HELP: &str = "https://kind.sigs.k8s.io/docs/user/local-registry/";
    pub const MINIKUBE_HELP: &str = "https://minikube.sigs.k8s.io/docs/handbook/registry/";
}
