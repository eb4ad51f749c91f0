//! Built-in project handlers
//!
//! All built-in types run as a single container whose image is built from
//! the project directory. They differ in how they are detected and in which
//! changed files force a full image rebuild instead of a restart.

mod docker;
mod liberty;
mod nodejs;
mod spring;
mod swift;

pub use docker::DockerProject;
pub use liberty::LibertyProject;
pub use nodejs::NodeProject;
pub use spring::SpringProject;
pub use swift::SwiftProject;

use crate::{BuildHandler, BuildOutcome, Operation};
use anyhow::{Context, Result};
use container::{ContainerRuntime, ContainerState};
use pfw_core::FileChangeEvent;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Handlers for every language type, without the generic fallback
pub fn builtin_handlers(runtime: Arc<dyn ContainerRuntime>) -> Vec<Arc<dyn BuildHandler>> {
    vec![
        Arc::new(LibertyProject::new(runtime.clone())),
        Arc::new(SpringProject::new(runtime.clone())),
        Arc::new(SwiftProject::new(runtime.clone())),
        Arc::new(NodeProject::new(runtime)),
    ]
}

/// Shared image build / container lifecycle flow
#[derive(Clone)]
pub(crate) struct ContainerBuilder {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerBuilder {
    pub(crate) fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Remove any old container, build the image and start a fresh container
    pub(crate) async fn rebuild(&self, operation: &Operation) -> Result<BuildOutcome> {
        let name = operation.container_name.as_str();
        let project_id = operation.project_id();

        if self.runtime.state(name).await? != ContainerState::NotFound {
            self.runtime.remove_container(name).await?;
        }

        info!(project_id, "Building image {}", name);
        self.runtime
            .build_image(name, &operation.project_info.location, &[])
            .await
            .with_context(|| format!("Image build failed for project {}", project_id))?;

        self.runtime
            .run_container(name)
            .await
            .with_context(|| format!("Container start failed for project {}", project_id))?;

        info!(project_id, "Container {} is running", name);
        Ok(BuildOutcome::Rebuilt)
    }

    /// Restart in place unless a trigger file changed or nothing is running
    pub(crate) async fn restart_or_rebuild(
        &self,
        operation: &Operation,
        changed_files: Option<&[FileChangeEvent]>,
        rebuild_triggers: &[&str],
    ) -> Result<BuildOutcome> {
        if needs_rebuild(changed_files, rebuild_triggers) {
            return self.rebuild(operation).await;
        }

        let name = operation.container_name.as_str();
        match self.runtime.state(name).await? {
            ContainerState::Active => {
                info!(project_id = operation.project_id(), "Restarting container {}", name);
                self.runtime.restart_container(name).await?;
                Ok(BuildOutcome::Restarted)
            }
            _ => self.rebuild(operation).await,
        }
    }
}

/// Explicit updates and changes to any trigger file need a new image
pub(crate) fn needs_rebuild(changed_files: Option<&[FileChangeEvent]>, rebuild_triggers: &[&str]) -> bool {
    match changed_files {
        None => true,
        Some(events) => events
            .iter()
            .any(|event| rebuild_triggers.iter().any(|t| event.is_file_named(t))),
    }
}

pub(crate) async fn file_exists(location: &Path, name: &str) -> bool {
    tokio::fs::metadata(location.join(name))
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Whether the project's `pom.xml` declares a dependency group
pub(crate) async fn pom_declares(location: &Path, group_id: &str) -> bool {
    match tokio::fs::read_to_string(location.join("pom.xml")).await {
        Ok(pom) => pom.contains(&format!("<groupId>{}</groupId>", group_id)),
        Err(_) => false,
    }
}
