//! Project metadata lookup

use crate::{ProjectInfo, ProjectSettings, SettingsApplier};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Project does not exist {0}")]
    NotFound(String),

    #[error("failed to read project info {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse project info {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read access to project metadata
#[async_trait]
pub trait ProjectInfoSource: Send + Sync {
    /// Snapshot of a project's metadata, `NotFound` if it has none
    async fn read_project_info(&self, project_id: &str) -> Result<ProjectInfo, LookupError>;
}

/// Project info files stored as `<dir>/<projectID>.json`
#[derive(Debug, Clone)]
pub struct ProjectInfoDir {
    dir: PathBuf,
}

impl ProjectInfoDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Info file path for a project
    pub fn info_file(&self, project_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", project_id))
    }

    pub async fn write_project_info(&self, info: &ProjectInfo) -> Result<(), LookupError> {
        let path = self.info_file(&info.project_id);
        let data = serde_json::to_vec_pretty(info).map_err(|source| LookupError::Parse {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|source| LookupError::Io { path, source })
    }
}

#[async_trait]
impl ProjectInfoSource for ProjectInfoDir {
    async fn read_project_info(&self, project_id: &str) -> Result<ProjectInfo, LookupError> {
        // Ids come from the wire; never let one escape the info directory
        if project_id.is_empty() || project_id.contains(['/', '\\']) || project_id.starts_with('.') {
            return Err(LookupError::NotFound(project_id.to_string()));
        }

        let path = self.info_file(project_id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LookupError::NotFound(project_id.to_string()));
            }
            Err(source) => return Err(LookupError::Io { path, source }),
        };

        serde_json::from_str(&data).map_err(|source| LookupError::Parse { path, source })
    }
}

/// Settings land in the project info file
#[async_trait]
impl SettingsApplier for ProjectInfoDir {
    async fn apply(&self, project_id: &str, settings: ProjectSettings) -> anyhow::Result<()> {
        let mut info = self.read_project_info(project_id).await?;
        if settings.apply_to(&mut info) {
            self.write_project_info(&info).await?;
            debug!(project_id, "Project info updated from settings");
        }
        Ok(())
    }
}
