// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevclusterError {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Unsupported product: {0}")]
    NotSupported(String),

    #[error("{tool} not installed. Please install {tool} with these instructions: {help}")]
    NotInstalled { tool: String, help: String },

    #[error("Container engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Invalid field selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid desktop settings: {0}")]
    InvalidSettings(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to load kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("{program} failed: {message}")]
    Command { program: String, message: String },

    #[error("Engine request failed: {0}")]
    Engine(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled while {0}")]
    Cancelled(String),
}

impl DevclusterError {
    pub fn cluster_not_found(name: impl Into<String>) -> Self {
        DevclusterError::NotFound {
            kind: "cluster",
            name: name.into(),
        }
    }

    pub fn registry_not_found(name: impl Into<String>) -> Self {
        DevclusterError::NotFound {
            kind: "registry",
            name: name.into(),
        }
    }

    /// True for errors a caller may treat as "already absent".
    pub fn is_not_found(&self) -> bool {
        match self {
            DevclusterError::NotFound { .. } => true,
            DevclusterError::Kube(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for DevclusterError {
    fn from(err: serde_json::Error) -> Self {
        DevclusterError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DevclusterError {
    fn from(err: serde_yaml::Error) -> Self {
        DevclusterError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DevclusterError>;
