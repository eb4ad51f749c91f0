//! Generic container projects
//!
//! Fallback for any project type without a dedicated handler. The only
//! thing known about such a project is its Dockerfile, so every update
//! rebuilds the image.

use super::{file_exists, ContainerBuilder};
use crate::{BuildHandler, BuildOutcome, Operation, DOCKER_TYPE};
use anyhow::Result;
use async_trait::async_trait;
use container::ContainerRuntime;
use pfw_core::FileChangeEvent;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct DockerProject {
    builder: ContainerBuilder,
}

impl DockerProject {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            builder: ContainerBuilder::new(runtime),
        }
    }
}

#[async_trait]
impl BuildHandler for DockerProject {
    fn supported_type(&self) -> &str {
        DOCKER_TYPE
    }

    async fn type_matches(&self, location: &Path) -> bool {
        file_exists(location, "Dockerfile").await
    }

    async fn update(&self, operation: &Operation, changed_files: Option<&[FileChangeEvent]>) -> Result<BuildOutcome> {
        debug!(
            project_id = operation.project_id(),
            project_type = %operation.project_info.project_type,
            changed = changed_files.map_or(0, <[FileChangeEvent]>::len),
            "Generic container build"
        );
        self.builder.rebuild(operation).await
    }
}
