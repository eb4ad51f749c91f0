//! Shared fixtures for coordinator integration tests
//!
//! Projects live in memory, builds are recorded instead of run, and a gated
//! handler can hold a build "in progress" until the test releases it.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use coordinator::{CoordinatorOptions, UpdateCoordinator};
use handlers::{BuildHandler, BuildHandlerRegistry, BuildOutcome, Operation};
use parking_lot::Mutex;
use pfw_core::{FileChangeEvent, LookupError, ProjectInfo, ProjectInfoSource, ProjectSettings, SettingsApplier};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub const PROJECT_TYPE: &str = "nodejs";
pub const DEBOUNCE: Duration = Duration::from_secs(20);

/// What the source returns for a project id
enum Entry {
    Project(ProjectInfo),
    Unreadable,
    Panics,
}

#[derive(Default)]
pub struct MemoryProjects {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryProjects {
    pub fn insert(&self, info: ProjectInfo) {
        self.entries
            .lock()
            .insert(info.project_id.clone(), Entry::Project(info));
    }

    pub fn insert_unreadable(&self, project_id: &str) {
        self.entries.lock().insert(project_id.to_string(), Entry::Unreadable);
    }

    pub fn insert_panicking(&self, project_id: &str) {
        self.entries.lock().insert(project_id.to_string(), Entry::Panics);
    }

    pub fn set_auto_build(&self, project_id: &str, enabled: bool) {
        self.update(project_id, |info| info.auto_build_enabled = enabled);
    }

    pub fn update(&self, project_id: &str, change: impl FnOnce(&mut ProjectInfo)) {
        if let Some(Entry::Project(info)) = self.entries.lock().get_mut(project_id) {
            change(info);
        }
    }
}

#[async_trait]
impl ProjectInfoSource for MemoryProjects {
    async fn read_project_info(&self, project_id: &str) -> Result<ProjectInfo, LookupError> {
        let outcome = match self.entries.lock().get(project_id) {
            Some(Entry::Project(info)) => Ok(info.clone()),
            Some(Entry::Unreadable) => Err(LookupError::Io {
                path: PathBuf::from(format!("/projects/{}.json", project_id)),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
            }),
            Some(Entry::Panics) => panic!("project source blew up"),
            None => Err(LookupError::NotFound(project_id.to_string())),
        };
        outcome
    }
}

/// Build handler that records every build
pub struct RecordingHandler {
    project_type: String,
    builds: Mutex<Vec<Option<Vec<String>>>>,
    built_projects: Mutex<Vec<ProjectInfo>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    gated: bool,
    gate: Semaphore,
    failing: AtomicBool,
}

impl RecordingHandler {
    pub fn new(project_type: &str) -> Self {
        Self {
            project_type: project_type.to_string(),
            builds: Mutex::new(Vec::new()),
            built_projects: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            gated: false,
            gate: Semaphore::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Every build blocks until `release` is called once for it
    pub fn gated(project_type: &str) -> Self {
        Self {
            gated: true,
            ..Self::new(project_type)
        }
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn fail_builds(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Changed file paths of every build, `None` for full builds
    pub fn builds(&self) -> Vec<Option<Vec<String>>> {
        self.builds.lock().clone()
    }

    /// Project info each build was handed
    pub fn built_projects(&self) -> Vec<ProjectInfo> {
        self.built_projects.lock().clone()
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildHandler for RecordingHandler {
    fn supported_type(&self) -> &str {
        &self.project_type
    }

    async fn type_matches(&self, _location: &Path) -> bool {
        false
    }

    async fn update(&self, operation: &Operation, changed_files: Option<&[FileChangeEvent]>) -> Result<BuildOutcome> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.built_projects.lock().push(operation.project_info.clone());
        self.builds
            .lock()
            .push(changed_files.map(|events| events.iter().map(|e| e.path.clone()).collect()));

        if self.gated {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("image build failed");
        }
        Ok(BuildOutcome::Rebuilt)
    }
}

/// Records applied settings and writes them into the project source
#[derive(Default)]
pub struct RecordingSettings {
    applied: Mutex<Vec<(String, ProjectSettings)>>,
    projects: Option<Arc<MemoryProjects>>,
}

impl RecordingSettings {
    pub fn writing_to(projects: Arc<MemoryProjects>) -> Self {
        Self {
            projects: Some(projects),
            ..Default::default()
        }
    }

    pub fn applied(&self) -> Vec<(String, ProjectSettings)> {
        self.applied.lock().clone()
    }
}

#[async_trait]
impl SettingsApplier for RecordingSettings {
    async fn apply(&self, project_id: &str, settings: ProjectSettings) -> Result<()> {
        if let Some(projects) = &self.projects {
            projects.update(project_id, |info| {
                settings.apply_to(info);
            });
        }
        self.applied.lock().push((project_id.to_string(), settings));
        Ok(())
    }
}

pub struct Harness {
    pub coordinator: UpdateCoordinator,
    pub projects: Arc<MemoryProjects>,
    pub handler: Arc<RecordingHandler>,
    pub fallback: Arc<RecordingHandler>,
    pub settings: Arc<RecordingSettings>,
    pub workspace: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_handler(RecordingHandler::new(PROJECT_TYPE))
    }

    pub fn gated() -> Self {
        Self::with_handler(RecordingHandler::gated(PROJECT_TYPE))
    }

    pub fn with_handler(handler: RecordingHandler) -> Self {
        let projects = Arc::new(MemoryProjects::default());
        let handler = Arc::new(handler);
        let fallback = Arc::new(RecordingHandler::new(handlers::DOCKER_TYPE));
        let settings = Arc::new(RecordingSettings::writing_to(projects.clone()));

        let registry = Arc::new(BuildHandlerRegistry::new(
            vec![handler.clone() as Arc<dyn BuildHandler>],
            fallback.clone(),
        ));
        let coordinator = UpdateCoordinator::builder(projects.clone(), registry)
            .settings_applier(settings.clone())
            .options(CoordinatorOptions {
                debounce: DEBOUNCE,
                ..Default::default()
            })
            .build();

        Self {
            coordinator,
            projects,
            handler,
            fallback,
            settings,
            workspace: TempDir::new().unwrap(),
        }
    }

    /// Register a project rooted in its own directory of the workspace
    pub fn add_project(&self, project_id: &str) -> ProjectInfo {
        self.add_project_of_type(project_id, PROJECT_TYPE)
    }

    pub fn add_project_of_type(&self, project_id: &str, project_type: &str) -> ProjectInfo {
        let location = self.workspace.path().join(project_id);
        std::fs::create_dir_all(&location).unwrap();
        let info = ProjectInfo::new(project_id, project_type, location);
        self.projects.insert(info.clone());
        info
    }

    pub fn write_settings(&self, project_id: &str, contents: &str) {
        let path = self.workspace.path().join(project_id).join(".cw-settings");
        std::fs::write(path, contents).unwrap();
    }

    /// Send one chunk of a batch
    pub async fn notify(&self, project_id: &str, timestamp: u64, chunk: u32, chunk_total: u32, paths: &[&str]) -> u16 {
        let events = paths.iter().map(|p| event(p, timestamp)).collect();
        let result = self
            .coordinator
            .update_project_for_new_change(project_id, timestamp, chunk, chunk_total, events)
            .await;
        coordinator::status_code(&result)
    }
}

pub fn event(path: &str, timestamp: u64) -> FileChangeEvent {
    FileChangeEvent::new(path, timestamp, "MODIFY")
}

/// Changed paths of a build as owned strings
pub fn paths(paths: &[&str]) -> Option<Vec<String>> {
    Some(paths.iter().map(|p| p.to_string()).collect())
}

/// Let spawned build tasks run to their next suspension point
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
