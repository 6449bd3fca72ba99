// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{polling, DEFAULT_ENGINE_SOCKET};
use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Host operating system, as in `std::env::consts::OS`
    pub os: String,
    /// Unix socket of the container engine API
    pub engine_socket: PathBuf,
    /// Unix socket of the desktop product's settings API
    pub desktop_socket: Option<PathBuf>,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    /// Upper bound on the time spent sleeping in one wait, on top of the
    /// attempt count
    pub poll_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        let os = env::consts::OS.to_string();
        let desktop_socket = default_desktop_socket(&os);
        Self {
            os,
            engine_socket: PathBuf::from(DEFAULT_ENGINE_SOCKET),
            desktop_socket,
            poll_attempts: polling::ATTEMPTS,
            poll_interval: Duration::from_secs(polling::INTERVAL_SECS),
            poll_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let os = env::var("DEVCLUSTER_OS").unwrap_or_else(|_| env::consts::OS.to_string());

        let engine_socket = match env::var("DOCKER_HOST") {
            Ok(host) if !host.is_empty() => engine_socket_from_host(&host)?,
            _ => PathBuf::from(DEFAULT_ENGINE_SOCKET),
        };

        let desktop_socket = match env::var("DEVCLUSTER_DESKTOP_SOCKET") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => default_desktop_socket(&os),
        };

        let poll_attempts = match env::var("DEVCLUSTER_POLL_ATTEMPTS") {
            Ok(v) => v
                .parse()
                .context("DEVCLUSTER_POLL_ATTEMPTS must be a positive integer")?,
            Err(_) => polling::ATTEMPTS,
        };

        let poll_interval = match env::var("DEVCLUSTER_POLL_INTERVAL_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .context("DEVCLUSTER_POLL_INTERVAL_SECS must be an integer")?,
            ),
            Err(_) => Duration::from_secs(polling::INTERVAL_SECS),
        };

        let poll_timeout = match env::var("DEVCLUSTER_POLL_TIMEOUT_SECS") {
            Ok(v) => Some(Duration::from_secs(
                v.parse()
                    .context("DEVCLUSTER_POLL_TIMEOUT_SECS must be an integer")?,
            )),
            Err(_) => None,
        };

        Ok(Config {
            os,
            engine_socket,
            desktop_socket,
            poll_attempts,
            poll_interval,
            poll_timeout,
        })
    }

    /// The desktop product only exposes its settings on these platforms
    pub fn has_desktop_settings(&self) -> bool {
        self.os == "darwin" || self.os == "macos" || self.os == "windows"
    }
}

/// Extract the socket path from a `unix://` DOCKER_HOST
fn engine_socket_from_host(host: &str) -> Result<PathBuf> {
    let url = Url::parse(host).with_context(|| format!("DOCKER_HOST is not a URL: {host}"))?;
    if url.scheme() != "unix" {
        return Err(anyhow!(
            "DOCKER_HOST scheme {} is not supported, only unix:// sockets are",
            url.scheme()
        ));
    }
    Ok(PathBuf::from(url.path()))
}

fn default_desktop_socket(os: &str) -> Option<PathBuf> {
    let home = home::home_dir()?;
    match os {
        "macos" | "darwin" => Some(home.join(
            "Library/Containers/com.docker.docker/Data/backend.native.sock",
        )),
        _ => None,
    }
}
