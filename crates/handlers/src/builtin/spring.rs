//! Spring Boot projects

use super::{pom_declares, ContainerBuilder};
use crate::{BuildHandler, BuildOutcome, Operation};
use anyhow::Result;
use async_trait::async_trait;
use container::ContainerRuntime;
use pfw_core::{ControlCommand, FileChangeEvent, ProjectCapabilities, StartMode};
use std::path::Path;
use std::sync::Arc;

const REBUILD_TRIGGERS: &[&str] = &["Dockerfile", "pom.xml"];

pub struct SpringProject {
    builder: ContainerBuilder,
}

impl SpringProject {
    pub const TYPE: &'static str = "spring";

    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            builder: ContainerBuilder::new(runtime),
        }
    }
}

#[async_trait]
impl BuildHandler for SpringProject {
    fn supported_type(&self) -> &str {
        Self::TYPE
    }

    async fn type_matches(&self, location: &Path) -> bool {
        pom_declares(location, "org.springframework.boot").await
    }

    fn capabilities(&self) -> ProjectCapabilities {
        ProjectCapabilities::new(
            vec![StartMode::Run, StartMode::Debug, StartMode::DebugNoInit],
            vec![ControlCommand::Start, ControlCommand::Stop, ControlCommand::Restart],
        )
    }

    async fn update(&self, operation: &Operation, changed_files: Option<&[FileChangeEvent]>) -> Result<BuildOutcome> {
        self.builder
            .restart_or_rebuild(operation, changed_files, REBUILD_TRIGGERS)
            .await
    }
}
