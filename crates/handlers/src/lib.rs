//! Project type specific build handlers
//!
//! Every project type knows how to detect itself on disk, what it can do at
//! runtime, and how to turn a set of changed files into a container build.
//! Types without a dedicated handler are built by the generic container
//! handler.

pub mod builtin;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;
use pfw_core::{FileChangeEvent, ProjectCapabilities, ProjectInfo};
use std::path::Path;

pub use builtin::{builtin_handlers, DockerProject, LibertyProject, NodeProject, SpringProject, SwiftProject};
pub use registry::BuildHandlerRegistry;

/// Sentinel type of the generic container handler
pub const DOCKER_TYPE: &str = "docker";

/// A build request handed to a handler
#[derive(Debug, Clone)]
pub struct Operation {
    pub project_info: ProjectInfo,
    /// Container (and image) name of the project
    pub container_name: String,
}

impl Operation {
    pub fn update(project_info: ProjectInfo, container_name: impl Into<String>) -> Self {
        Self {
            project_info,
            container_name: container_name.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_info.project_id
    }
}

/// What a handler ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Image rebuilt and container recreated
    Rebuilt,
    /// Running container restarted in place
    Restarted,
}

#[async_trait]
pub trait BuildHandler: Send + Sync {
    /// Project type this handler builds
    fn supported_type(&self) -> &str;

    /// Whether the directory looks like a project of this type
    async fn type_matches(&self, location: &Path) -> bool;

    fn capabilities(&self) -> ProjectCapabilities {
        ProjectCapabilities::default()
    }

    /// Build the project; `changed_files` is `None` for an explicit update
    async fn update(
        &self,
        operation: &Operation,
        changed_files: Option<&[FileChangeEvent]>,
    ) -> Result<BuildOutcome>;
}
