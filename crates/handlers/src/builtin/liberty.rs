//! Open Liberty / MicroProfile projects

use super::{pom_declares, ContainerBuilder};
use crate::{BuildHandler, BuildOutcome, Operation};
use anyhow::Result;
use async_trait::async_trait;
use container::ContainerRuntime;
use pfw_core::{ControlCommand, FileChangeEvent, ProjectCapabilities, StartMode};
use std::path::Path;
use std::sync::Arc;

const REBUILD_TRIGGERS: &[&str] = &["Dockerfile", "Dockerfile-build", "pom.xml", "server.xml", "jvm.options"];

pub struct LibertyProject {
    builder: ContainerBuilder,
}

impl LibertyProject {
    pub const TYPE: &'static str = "liberty";

    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            builder: ContainerBuilder::new(runtime),
        }
    }
}

#[async_trait]
impl BuildHandler for LibertyProject {
    fn supported_type(&self) -> &str {
        Self::TYPE
    }

    async fn type_matches(&self, location: &Path) -> bool {
        pom_declares(location, "org.eclipse.microprofile").await
    }

    fn capabilities(&self) -> ProjectCapabilities {
        ProjectCapabilities::new(
            vec![StartMode::Run, StartMode::Debug],
            vec![ControlCommand::Start, ControlCommand::Stop, ControlCommand::Restart],
        )
    }

    async fn update(&self, operation: &Operation, changed_files: Option<&[FileChangeEvent]>) -> Result<BuildOutcome> {
        self.builder
            .restart_or_rebuild(operation, changed_files, REBUILD_TRIGGERS)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::testing::RecordingRuntime;
    use container::ContainerState;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_detects_microprofile_pom() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("pom.xml"),
            "<project><dependency><groupId>org.eclipse.microprofile</groupId></dependency></project>",
        )
        .unwrap();

        let handler = LibertyProject::new(Arc::new(RecordingRuntime::new(ContainerState::NotFound)));
        assert!(handler.type_matches(temp_dir.path()).await);
    }

    #[tokio::test]
    async fn test_rejects_spring_pom() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("pom.xml"),
            "<groupId>org.springframework.boot</groupId>",
        )
        .unwrap();

        let handler = LibertyProject::new(Arc::new(RecordingRuntime::new(ContainerState::NotFound)));
        assert!(!handler.type_matches(temp_dir.path()).await);
    }

    #[test]
    fn test_supports_debug() {
        let handler = LibertyProject::new(Arc::new(RecordingRuntime::new(ContainerState::NotFound)));
        assert!(handler.capabilities().supports(StartMode::Debug));
        assert!(!handler.capabilities().supports(StartMode::DebugNoInit));
    }
}
