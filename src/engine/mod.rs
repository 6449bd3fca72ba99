// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Container engine and desktop product clients.

pub mod desktop;
pub mod socket;

pub use desktop::{DesktopClient, DesktopSettings, DockerDesktopClient};
pub use socket::SocketEndpoint;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EngineVersion {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub os: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct EngineInfo {
    #[serde(rename = "NCPU", default)]
    pub ncpu: u32,
    #[serde(rename = "OperatingSystem", default)]
    pub operating_system: String,
}

/// The subset of the container engine API the machine controller needs
#[async_trait]
pub trait EngineClient: Send + Sync {
    async fn server_version(&self) -> Result<EngineVersion>;
    async fn info(&self) -> Result<EngineInfo>;
}

/// Talks to the Docker engine API on its unix socket
#[derive(Debug, Clone)]
pub struct DockerEngineClient {
    endpoint: SocketEndpoint,
}

impl DockerEngineClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: SocketEndpoint::new(socket),
        }
    }
}

#[async_trait]
impl EngineClient for DockerEngineClient {
    async fn server_version(&self) -> Result<EngineVersion> {
        self.endpoint.get_json("/version").await
    }

    async fn info(&self) -> Result<EngineInfo> {
        self.endpoint.get_json("/info").await
    }
}
