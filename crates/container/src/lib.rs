//! Container runtime access for project builds
//!
//! This crate provides:
//! - The `ContainerRuntime` contract used by build handlers
//! - A docker CLI implementation of it
//! - Published port mapping and application/debug port resolution

pub mod docker;
pub mod ports;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub use docker::DockerCli;
pub use ports::{resolve_ports, ContainerInfo, ContainerPortResolver, PortBinding, PortMapping, ResolvedPorts};

/// Lifecycle state of a named container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    NotFound,
    Stopped,
    Starting,
    Active,
}

impl ContainerState {
    /// Map a runtime state string (`created`, `running`, `exited`, ...)
    pub fn from_runtime_state(state: &str) -> Self {
        match state {
            "created" | "restarting" => ContainerState::Starting,
            "running" => ContainerState::Active,
            _ => ContainerState::Stopped,
        }
    }
}

/// Live facts about a running container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: String,
    /// Address on the first attached network
    pub ip: String,
    pub ports: PortMapping,
}

/// Image build and container lifecycle primitives
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Details of a running container, `None` if no running container has this name
    async fn inspect(&self, name: &str) -> Result<Option<ContainerDetails>>;

    async fn state(&self, name: &str) -> Result<ContainerState>;

    async fn build_image(&self, image: &str, context: &Path, options: &[String]) -> Result<()>;

    /// Start a container from the image of the same name
    async fn run_container(&self, name: &str) -> Result<()>;

    async fn restart_container(&self, name: &str) -> Result<()>;

    /// Remove the container and its image
    async fn remove_container(&self, name: &str) -> Result<()>;
}
