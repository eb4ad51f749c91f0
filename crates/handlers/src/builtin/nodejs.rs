//! Node.js projects

use super::{file_exists, ContainerBuilder};
use crate::{BuildHandler, BuildOutcome, Operation};
use anyhow::Result;
use async_trait::async_trait;
use container::ContainerRuntime;
use pfw_core::{ControlCommand, FileChangeEvent, ProjectCapabilities, StartMode};
use std::path::Path;
use std::sync::Arc;

const REBUILD_TRIGGERS: &[&str] = &["Dockerfile", "package.json", "package-lock.json"];

pub struct NodeProject {
    builder: ContainerBuilder,
}

impl NodeProject {
    pub const TYPE: &'static str = "nodejs";

    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            builder: ContainerBuilder::new(runtime),
        }
    }
}

#[async_trait]
impl BuildHandler for NodeProject {
    fn supported_type(&self) -> &str {
        Self::TYPE
    }

    async fn type_matches(&self, location: &Path) -> bool {
        file_exists(location, "package.json").await
    }

    fn capabilities(&self) -> ProjectCapabilities {
        ProjectCapabilities::new(
            vec![StartMode::Run, StartMode::DebugNoInit],
            vec![ControlCommand::Start, ControlCommand::Stop, ControlCommand::Restart],
        )
    }

    async fn update(&self, operation: &Operation, changed_files: Option<&[FileChangeEvent]>) -> Result<BuildOutcome> {
        self.builder
            .restart_or_rebuild(operation, changed_files, REBUILD_TRIGGERS)
            .await
    }
}
