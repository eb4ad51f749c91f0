//! Docker CLI implementation of `ContainerRuntime`

use crate::{ContainerDetails, ContainerRuntime, ContainerState, PortMapping};
use anyhow::{Context, Result};
use async_trait::async_trait;
use pfw_core::config::ContainerConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Output;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// A docker invocation that exited unsuccessfully
#[derive(Debug, Error)]
#[error("docker {args} failed ({status}): {stderr}")]
pub struct CommandError {
    pub args: String,
    pub status: String,
    pub stderr: String,
}

/// Shells out to the docker binary
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    network: String,
    label: String,
}

impl DockerCli {
    pub fn new(config: &ContainerConfig) -> Self {
        Self {
            binary: config.docker_binary.clone(),
            network: config.network.clone(),
            label: config.build_label.clone(),
        }
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!("Run docker command: {} {}", self.binary, args.join(" "));
        Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.binary))
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(CommandError {
                args: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `docker inspect` of one container, `None` when it does not exist
    async fn inspect_raw(&self, name: &str) -> Result<Option<InspectData>> {
        let output = self.output(&["inspect", "--type", "container", name]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No such") {
                return Ok(None);
            }
            return Err(CommandError {
                args: format!("inspect {}", name),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        let entries: Vec<InspectData> =
            serde_json::from_slice(&output.stdout).context("Failed to parse docker inspect output")?;
        // docker prefixes names with '/'
        let wanted = format!("/{}", name);
        Ok(entries
            .into_iter()
            .find(|e| e.name == wanted || e.name == name))
    }
}

#[derive(Debug, Deserialize)]
struct InspectData {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "State", default)]
    state: InspectState,
    #[serde(rename = "NetworkSettings", default)]
    network: InspectNetwork,
}

#[derive(Debug, Default, Deserialize)]
struct InspectState {
    #[serde(rename = "Status", default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct InspectNetwork {
    #[serde(rename = "Networks", default)]
    networks: BTreeMap<String, InspectEndpoint>,
    #[serde(rename = "Ports", default)]
    ports: PortMapping,
}

#[derive(Debug, Default, Deserialize)]
struct InspectEndpoint {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

impl InspectData {
    fn into_details(self) -> ContainerDetails {
        let ip = self
            .network
            .networks
            .into_values()
            .next()
            .map(|n| n.ip_address)
            .unwrap_or_default();
        ContainerDetails {
            id: self.id,
            ip,
            ports: self.network.ports,
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect(&self, name: &str) -> Result<Option<ContainerDetails>> {
        Ok(self
            .inspect_raw(name)
            .await?
            .filter(|data| data.state.status == "running")
            .map(InspectData::into_details))
    }

    async fn state(&self, name: &str) -> Result<ContainerState> {
        Ok(match self.inspect_raw(name).await? {
            Some(data) => ContainerState::from_runtime_state(&data.state.status),
            None => ContainerState::NotFound,
        })
    }

    async fn build_image(&self, image: &str, context: &Path, options: &[String]) -> Result<()> {
        let context = context.to_string_lossy();
        let mut args = vec!["build", "--label", self.label.as_str(), "-t", image];
        args.extend(options.iter().map(String::as_str));
        args.push(&*context);

        info!("Building image {}", image);
        self.run(&args).await?;
        Ok(())
    }

    async fn run_container(&self, name: &str) -> Result<()> {
        let network = format!("--network={}", self.network);
        info!("Run docker container {}", name);
        self.run(&["run", "--label", self.label.as_str(), "--name", name, network.as_str(), "-P", "-dt", name])
            .await?;
        Ok(())
    }

    async fn restart_container(&self, name: &str) -> Result<()> {
        info!("Restarting docker container {}", name);
        self.run(&["restart", name]).await?;
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        info!("Removing docker container {}", name);
        self.run(&["rm", "-f", name])
            .await
            .context("Error removing container")?;
        self.run(&["rmi", "-f", name])
            .await
            .context("Error removing image")?;
        Ok(())
    }
}
