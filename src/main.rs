// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use devcluster::admin::default_admins;
use devcluster::config::Config;
use devcluster::constants::{CLUSTER_KIND, REGISTRY_KIND};
use devcluster::controller::Controller;
use devcluster::engine::{DockerDesktopClient, DockerEngineClient};
use devcluster::error::Result as DevclusterResult;
use devcluster::kubernetes::{ClientLoader, ContextStore, KubeconfigClientLoader, KubeconfigStore};
use devcluster::machine::MachineController;
use devcluster::process::{CommandRunner, ProcessRunner};
use devcluster::registry::{DockerRegistryCoordinator, RegistryCoordinator};
use devcluster::retry::{Poller, TokioClock};
use devcluster::selector::ListOptions;
use devcluster::setup;
use devcluster::types::{Cluster, Registry};

#[derive(Parser)]
#[command(name = "devcluster", version, about = "Local development Kubernetes clusters")]
struct Cli {
    /// Kubeconfig to read instead of the default
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show clusters or registries
    Get {
        #[arg(value_enum, default_value = "cluster")]
        resource: Resource,
        name: Option<String>,
        #[arg(long)]
        field_selector: Option<String>,
        #[arg(long)]
        ignore_not_found: bool,
    },
    /// Create or update clusters and registries from a YAML file
    Apply {
        #[arg(short = 'f', long = "filename")]
        file: PathBuf,
    },
    /// Delete a cluster
    Delete {
        name: String,
        #[arg(long)]
        ignore_not_found: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Resource {
    #[value(alias = "clusters")]
    Cluster,
    #[value(alias = "registries")]
    Registry,
}

fn print_yaml<T: Serialize>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

/// Swallow NotFound when the user asked for it
fn allow_not_found<T>(result: DevclusterResult<T>, ignore: bool) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if ignore && e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn apply_file(
    controller: &Controller,
    registries: &dyn RegistryCoordinator,
    file: &Path,
) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    for document in serde_yaml::Deserializer::from_str(&contents) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }

        match value.get("kind").and_then(|k| k.as_str()) {
            Some(REGISTRY_KIND) => {
                let desired: Registry = serde_yaml::from_value(value)?;
                print_yaml(&registries.apply(&desired).await?)?;
            }
            Some(CLUSTER_KIND) | None => {
                let desired: Cluster = serde_yaml::from_value(value)?;
                print_yaml(&controller.apply(&desired).await?)?;
            }
            Some(other) => bail!("Unsupported kind {:?} in {}", other, file.display()),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup::init_tracing();
    setup::install_crypto_provider();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!(os = %config.os, engine = %config.engine_socket.display(), "Configuration loaded");

    let cancel = CancellationToken::new();
    let mut poller = Poller::new(
        config.poll_attempts,
        config.poll_interval,
        Arc::new(TokioClock),
        cancel.clone(),
    );
    if let Some(timeout) = config.poll_timeout {
        poller = poller.with_deadline(timeout);
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let engine = Arc::new(DockerEngineClient::new(config.engine_socket.clone()));
    let desktop = Arc::new(DockerDesktopClient::new(
        config.desktop_socket.clone(),
        config.os.clone(),
        runner.clone(),
    ));
    let machine = Arc::new(MachineController::new(
        engine,
        desktop,
        config.has_desktop_settings(),
        poller.clone(),
    ));
    let contexts: Arc<dyn ContextStore> = Arc::new(KubeconfigStore::new(cli.kubeconfig));
    let registries = Arc::new(DockerRegistryCoordinator::new(runner.clone()));
    let loader: Arc<dyn ClientLoader> = Arc::new(KubeconfigClientLoader);
    let admins = default_admins(
        runner,
        machine.clone(),
        contexts.clone(),
        loader.clone(),
        poller,
    );

    let controller = Controller::new(admins, machine, registries.clone(), contexts, loader)
    .with_cancel(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    match cli.command {
        Command::Get {
            resource,
            name,
            field_selector,
            ignore_not_found,
        } => {
            let options = ListOptions { field_selector };
            match (resource, name) {
                (Resource::Cluster, None) => print_yaml(&controller.list(&options).await?)?,
                (Resource::Cluster, Some(name)) => {
                    if let Some(cluster) =
                        allow_not_found(controller.get(&name).await, ignore_not_found)?
                    {
                        print_yaml(&cluster)?;
                    }
                }
                (Resource::Registry, None) => print_yaml(&registries.list(&options).await?)?,
                (Resource::Registry, Some(name)) => {
                    if let Some(registry) =
                        allow_not_found(registries.get(&name).await, ignore_not_found)?
                    {
                        print_yaml(&registry)?;
                    }
                }
            }
        }
        Command::Apply { file } => apply_file(&controller, registries.as_ref(), &file).await?,
        Command::Delete {
            name,
            ignore_not_found,
        } => {
            if allow_not_found(controller.delete(&name).await, ignore_not_found)?.is_some() {
                println!("cluster {} deleted", name);
            }
        }
    }

    Ok(())
}
