//! Turns update requests and file change notifications into builds
//!
//! Every per-project state transition (buffer append, chunk countdown, timer
//! arm or cancel, dispatch decision) happens with the coordinator's locks
//! held. Builds run on their own task and are never awaited by a request.

use crate::chunks::ChunkReassembler;
use crate::debounce::DebounceScheduler;
use crate::keyed_lock::{KeyedLock, ALL_LOCKS, CHANGED_FILES_LOCK, TIMER_LOCK};
use crate::tracker::{BuildSlot, BuildTracker, FollowUp, LogReporter, StatusReporter};
use dashmap::DashMap;
use futures::FutureExt;
use handlers::{BuildHandlerRegistry, Operation};
use parking_lot::Mutex;
use pfw_core::settings::SETTINGS_FILE_NAME;
use pfw_core::{Config, FileChangeEvent, LookupError, ProjectInfo, ProjectInfoSource, ProjectSettings, SettingsApplier};
use serde::Deserialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Status code of an accepted request
pub const ACCEPTED: u16 = 202;

const MISSING_CHANGE_FIELDS: &str =
    "Bad request. projectID, timestamp, chunk, chunk_total and eventArray are required.";

/// Why a request was not accepted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdateError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Project does not exist {0}")]
    NotFound(String),

    #[error("Internal error occurred when updating project {0}")]
    Internal(String),
}

impl UpdateError {
    pub fn status_code(&self) -> u16 {
        match self {
            UpdateError::BadRequest(_) => 400,
            UpdateError::NotFound(_) => 404,
            UpdateError::Internal(_) => 500,
        }
    }
}

pub type UpdateResult = Result<(), UpdateError>;

/// Status code of a request outcome
pub fn status_code(result: &UpdateResult) -> u16 {
    match result {
        Ok(()) => ACCEPTED,
        Err(e) => e.status_code(),
    }
}

/// One chunk of a change batch as sent by the watcher
///
/// Every field is required. Zero counts as missing for the numeric fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChangeNotification {
    #[serde(rename = "projectID", default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub chunk: Option<u32>,
    #[serde(default, alias = "chunkTotal")]
    pub chunk_total: Option<u32>,
    #[serde(rename = "eventArray", alias = "events", default)]
    pub events: Option<Vec<FileChangeEvent>>,
}

struct ValidChange {
    project_id: String,
    timestamp: u64,
    chunk: u32,
    chunk_total: u32,
    events: Vec<FileChangeEvent>,
}

impl ChangeNotification {
    pub fn new(
        project_id: impl Into<String>,
        timestamp: u64,
        chunk: u32,
        chunk_total: u32,
        events: Vec<FileChangeEvent>,
    ) -> Self {
        Self {
            project_id: Some(project_id.into()),
            timestamp: Some(timestamp),
            chunk: Some(chunk),
            chunk_total: Some(chunk_total),
            events: Some(events),
        }
    }

    fn validate(self) -> Result<ValidChange, UpdateError> {
        let missing = || UpdateError::BadRequest(MISSING_CHANGE_FIELDS.to_string());
        Ok(ValidChange {
            project_id: self.project_id.filter(|id| !id.is_empty()).ok_or_else(missing)?,
            timestamp: self.timestamp.filter(|&t| t != 0).ok_or_else(missing)?,
            chunk: self.chunk.filter(|&c| c != 0).ok_or_else(missing)?,
            chunk_total: self.chunk_total.filter(|&c| c != 0).ok_or_else(missing)?,
            events: self.events.ok_or_else(missing)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Quiet period before an incomplete batch is built anyway
    pub debounce: Duration,
    /// Settings file name at the project root
    pub settings_file: String,
    /// Prefix of container and image names
    pub container_prefix: String,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(20),
            settings_file: SETTINGS_FILE_NAME.to_string(),
            container_prefix: "mc-".to_string(),
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.coordinator.debounce(),
            settings_file: config.coordinator.settings_file.clone(),
            container_prefix: config.containers.name_prefix.clone(),
        }
    }

    fn container_name(&self, project_id: &str) -> String {
        format!("{}{}", self.container_prefix, project_id)
    }
}

pub struct CoordinatorBuilder {
    projects: Arc<dyn ProjectInfoSource>,
    registry: Arc<BuildHandlerRegistry>,
    settings: Option<Arc<dyn SettingsApplier>>,
    reporter: Arc<dyn StatusReporter>,
    options: CoordinatorOptions,
}

impl CoordinatorBuilder {
    pub fn settings_applier(mut self, applier: Arc<dyn SettingsApplier>) -> Self {
        self.settings = Some(applier);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn StatusReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn options(mut self, options: CoordinatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> UpdateCoordinator {
        let locks = Arc::new(KeyedLock::new());
        UpdateCoordinator {
            inner: Arc::new(Inner {
                projects: self.projects,
                registry: self.registry,
                settings: self.settings,
                reporter: self.reporter,
                options: self.options,
                timers: DebounceScheduler::guarded_by(locks.clone(), ALL_LOCKS),
                locks,
                pending: DashMap::new(),
                chunks: Mutex::new(ChunkReassembler::new()),
                tracker: BuildTracker::new(),
            }),
        }
    }
}

/// Per-project build scheduling
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct UpdateCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    projects: Arc<dyn ProjectInfoSource>,
    registry: Arc<BuildHandlerRegistry>,
    settings: Option<Arc<dyn SettingsApplier>>,
    reporter: Arc<dyn StatusReporter>,
    options: CoordinatorOptions,
    locks: Arc<KeyedLock>,
    /// Quiet-period timers; their callbacks run with every lock held
    timers: DebounceScheduler,
    /// Changes received but not yet handed to a build
    pending: DashMap<String, Vec<FileChangeEvent>>,
    chunks: Mutex<ChunkReassembler>,
    tracker: BuildTracker,
}

impl UpdateCoordinator {
    pub fn builder(projects: Arc<dyn ProjectInfoSource>, registry: Arc<BuildHandlerRegistry>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            projects,
            registry,
            settings: None,
            reporter: Arc::new(LogReporter),
            options: CoordinatorOptions::default(),
        }
    }

    pub fn registry(&self) -> &Arc<BuildHandlerRegistry> {
        &self.inner.registry
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.inner.options
    }

    /// Explicit, non file-triggered build request
    ///
    /// Pending changes are folded into the resulting full build.
    pub async fn update_project(&self, project_id: &str) -> UpdateResult {
        if project_id.is_empty() {
            return Err(UpdateError::BadRequest(
                "Bad request, projectID is required.".to_string(),
            ));
        }
        info!(project_id, "Project update requested");
        self.guarded(project_id, self.process_update(project_id)).await
    }

    /// File change notification of one chunk of a batch
    pub async fn notify_change(&self, notification: ChangeNotification) -> UpdateResult {
        let change = notification.validate()?;
        let project_id = change.project_id.clone();
        self.guarded(&project_id, self.process_change(change)).await
    }

    pub async fn update_project_for_new_change(
        &self,
        project_id: &str,
        timestamp: u64,
        chunk: u32,
        chunk_total: u32,
        events: Vec<FileChangeEvent>,
    ) -> UpdateResult {
        self.notify_change(ChangeNotification::new(project_id, timestamp, chunk, chunk_total, events))
            .await
    }

    /// Cancel every pending quiet-period timer
    ///
    /// Running builds are left to finish.
    pub fn shutdown(&self) {
        self.inner.timers.cancel_all();
    }

    /// Snapshot of changes waiting for a build
    pub fn pending_changes(&self, project_id: &str) -> Vec<FileChangeEvent> {
        self.inner
            .pending
            .get(project_id)
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn outstanding_batches(&self, project_id: &str) -> usize {
        self.inner.chunks.lock().outstanding(project_id)
    }

    pub fn has_pending_timer(&self, project_id: &str) -> bool {
        self.inner.timers.is_pending(project_id)
    }

    pub fn is_build_in_progress(&self, project_id: &str) -> bool {
        self.inner.tracker.is_build_in_progress(project_id)
    }

    pub fn is_build_requested(&self, project_id: &str) -> bool {
        self.inner.tracker.is_build_requested(project_id)
    }

    pub fn is_build_required(&self, project_id: &str) -> bool {
        self.inner.tracker.is_build_required(project_id)
    }

    /// Map panics inside request handling to internal errors
    async fn guarded(&self, project_id: &str, request: impl Future<Output = UpdateResult>) -> UpdateResult {
        match AssertUnwindSafe(request).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!(project_id, "Unexpected failure while updating project");
                Err(UpdateError::Internal(project_id.to_string()))
            }
        }
    }

    async fn project_info(&self, project_id: &str) -> Result<ProjectInfo, UpdateError> {
        match self.inner.projects.read_project_info(project_id).await {
            Ok(info) => Ok(info),
            Err(LookupError::NotFound(_)) => {
                warn!(project_id, "Project does not exist");
                Err(UpdateError::NotFound(project_id.to_string()))
            }
            Err(e) => {
                error!(project_id, "Failed to read project info: {}", e);
                Err(UpdateError::Internal(project_id.to_string()))
            }
        }
    }

    async fn process_update(&self, project_id: &str) -> UpdateResult {
        let info = self.project_info(project_id).await?;
        let inner = &self.inner;

        if !info.auto_build_enabled {
            info!(project_id, "Auto build disabled, build will not be started");
            self.mark_build_required(project_id);
            return Ok(());
        }

        let _guard = inner.locks.acquire(ALL_LOCKS).await;
        match inner.tracker.begin_or_queue(project_id, true) {
            BuildSlot::Started => {
                inner.timers.cancel(project_id);
                let folded = self.take_pending(project_id);
                if !folded.is_empty() {
                    debug!(project_id, "{} pending change(s) folded into full build", folded.len());
                }
                self.spawn_build(info, None);
            }
            BuildSlot::Queued => inner.reporter.build_queued(project_id),
        }
        Ok(())
    }

    async fn process_change(&self, change: ValidChange) -> UpdateResult {
        let ValidChange {
            project_id,
            timestamp,
            chunk,
            chunk_total,
            events,
        } = change;
        let id = project_id.as_str();
        let inner = &self.inner;

        info!(project_id = id, timestamp, "Project file changed, chunk {} of {}", chunk, chunk_total);
        let mut info = self.project_info(id).await?;

        {
            let _guard = inner.locks.acquire(&[TIMER_LOCK]).await;
            inner.timers.cancel(id);
        }

        let settings_file = inner.options.settings_file.as_str();
        let (settings_events, build_events): (Vec<_>, Vec<_>) =
            events.into_iter().partition(|e| e.is_file_named(settings_file));
        if !settings_events.is_empty() && self.apply_settings(&info).await {
            info = self.project_info(id).await?;
        }
        let settings_only = !settings_events.is_empty() && build_events.is_empty();

        if !build_events.is_empty() {
            let _guard = inner.locks.acquire(&[CHANGED_FILES_LOCK]).await;
            inner.pending.entry(project_id.clone()).or_default().extend(build_events);
        }

        let _guard = inner.locks.acquire(ALL_LOCKS).await;
        if settings_only && chunk_total <= 1 {
            // the cancelled timer may still have had changes to build
            if inner.chunks.lock().outstanding(id) > 0 || self.has_pending(id) {
                self.arm_quiet_period(id);
            }
            return Ok(());
        }

        let status = inner.chunks.lock().record_chunk(id, timestamp, chunk, chunk_total);
        if status.batch_complete() && !settings_only {
            self.trigger_build(&info, false);
        } else if status.batch_complete() && self.has_pending(id) {
            // earlier chunks of this batch carried the changes
            self.trigger_build(&info, true);
        } else if !status.batch_complete() {
            debug!(
                project_id = id,
                "Waiting for more chunks (last of batch: {}, other batches outstanding: {})",
                status.is_last_chunk,
                status.still_waiting_other_timestamps
            );
            self.arm_quiet_period(id);
        }
        Ok(())
    }

    /// Dispatch decision for a complete batch; every lock must be held
    ///
    /// With `require_changes` an empty pending buffer builds nothing.
    fn trigger_build(&self, info: &ProjectInfo, require_changes: bool) {
        let inner = &self.inner;
        let id = info.project_id.as_str();

        inner.timers.cancel(id);
        inner.chunks.lock().clear(id);

        if !info.auto_build_enabled {
            info!(project_id = id, "Auto build disabled, build will not be started");
            self.mark_build_required(id);
            return;
        }
        if require_changes && !self.has_pending(id) {
            debug!(project_id = id, "No pending changes to build");
            return;
        }

        match inner.tracker.begin_or_queue(id, false) {
            BuildSlot::Started => {
                let changes = self.take_pending(id);
                self.spawn_build(info.clone(), Some(changes));
            }
            BuildSlot::Queued => inner.reporter.build_queued(id),
        }
    }

    /// Project info is read again when the timer fires, before any lock is taken
    fn arm_quiet_period(&self, project_id: &str) {
        let this = self.clone();
        let projects = self.inner.projects.clone();
        let id = project_id.to_string();
        let lookup_id = id.clone();
        self.inner.timers.arm_prepared(
            project_id,
            self.inner.options.debounce,
            move || async move { projects.read_project_info(&lookup_id).await },
            move |info| async move {
                this.on_quiet_period(&id, info);
            },
        );
    }

    /// Runs with every lock held
    fn on_quiet_period(&self, project_id: &str, info: Result<ProjectInfo, LookupError>) {
        let info = match info {
            Ok(info) => info,
            Err(e) => {
                warn!(project_id, "Quiet period elapsed but project info is unavailable: {}", e);
                return;
            }
        };
        let id = info.project_id.as_str();
        let outstanding = self.inner.chunks.lock().outstanding(id);
        if outstanding > 0 {
            warn!(
                project_id = id,
                "Quiet period elapsed with {} incomplete batch(es), building the changes received so far", outstanding
            );
        }
        self.trigger_build(&info, true);
    }

    fn has_pending(&self, project_id: &str) -> bool {
        self.inner
            .pending
            .get(project_id)
            .map_or(false, |p| !p.is_empty())
    }

    fn take_pending(&self, project_id: &str) -> Vec<FileChangeEvent> {
        self.inner
            .pending
            .remove(project_id)
            .map(|(_, changes)| changes)
            .unwrap_or_default()
    }

    fn mark_build_required(&self, project_id: &str) {
        self.inner.tracker.set_build_required(project_id, true);
        self.inner.reporter.build_required(project_id, true);
    }

    /// Whether the project's settings were updated
    async fn apply_settings(&self, info: &ProjectInfo) -> bool {
        let project_id = info.project_id.as_str();
        let path = info.path_of(&self.inner.options.settings_file);
        info!(project_id, "Settings file changed, applying {}", path.display());

        let settings = match ProjectSettings::load(&path).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(project_id, "Ignoring settings file: {}", e);
                return false;
            }
        };

        match &self.inner.settings {
            Some(applier) => match applier.apply(project_id, settings).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(project_id, "Failed to apply settings: {:#}", e);
                    false
                }
            },
            None => {
                debug!(project_id, ?settings, "No settings applier configured");
                false
            }
        }
    }

    fn spawn_build(&self, info: ProjectInfo, changes: Option<Vec<FileChangeEvent>>) {
        tokio::spawn(self.clone().run_builds(info, changes));
    }

    /// Build, then keep building while follow-ups were requested
    async fn run_builds(self, mut info: ProjectInfo, mut changes: Option<Vec<FileChangeEvent>>) {
        loop {
            let project_id = info.project_id.clone();
            self.build_once(info, changes).await;

            let Some(follow_up) = self.inner.tracker.finish(&project_id) else {
                return;
            };
            info!(project_id = %project_id, "Build request flag set, starting follow-up build");

            match self.prepare_follow_up(&project_id, follow_up).await {
                Some((next_info, next_changes)) => {
                    info = next_info;
                    changes = next_changes;
                }
                None => {
                    self.inner.tracker.abandon(&project_id);
                    return;
                }
            }
        }
    }

    async fn build_once(&self, info: ProjectInfo, changes: Option<Vec<FileChangeEvent>>) {
        let inner = &self.inner;
        let project_id = info.project_id.clone();
        let handler = inner.registry.resolve(&info.project_type);
        let operation = Operation::update(info, inner.options.container_name(&project_id));

        match &changes {
            Some(changes) => info!(
                project_id = %project_id,
                "Dispatching {} build for {} changed file(s)",
                handler.supported_type(),
                changes.len()
            ),
            None => info!(project_id = %project_id, "Dispatching full {} build", handler.supported_type()),
        }
        inner.reporter.build_started(&project_id);

        let result = AssertUnwindSafe(handler.update(&operation, changes.as_deref()))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(anyhow::anyhow!("build handler panicked")));
        inner.reporter.build_finished(&project_id, &result);
    }

    /// Fresh project info and changes for a follow-up build
    async fn prepare_follow_up(
        &self,
        project_id: &str,
        follow_up: FollowUp,
    ) -> Option<(ProjectInfo, Option<Vec<FileChangeEvent>>)> {
        let info = match self.inner.projects.read_project_info(project_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(project_id, "Skipping follow-up build: {}", e);
                return None;
            }
        };
        if !info.auto_build_enabled {
            info!(project_id, "Auto build disabled, follow-up build will not be started");
            self.mark_build_required(project_id);
            return None;
        }

        let pending = {
            let _guard = self.inner.locks.acquire(&[CHANGED_FILES_LOCK]).await;
            self.take_pending(project_id)
        };
        let changes = if follow_up.explicit { None } else { Some(pending) };
        Some((info, changes))
    }
}
