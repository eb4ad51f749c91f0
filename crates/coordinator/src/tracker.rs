//! Per-project build bookkeeping and status reporting

use handlers::BuildOutcome;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{error, info};

/// Result of asking to start a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSlot {
    /// No build was running; the caller now owns the build
    Started,
    /// A build is running; a follow-up build has been requested
    Queued,
}

/// A follow-up build requested while the previous one ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUp {
    /// At least one request was an explicit update
    pub explicit: bool,
}

#[derive(Debug, Default)]
struct BuildState {
    in_progress: bool,
    requested: Option<FollowUp>,
    build_required: bool,
}

impl BuildState {
    fn is_idle(&self) -> bool {
        !self.in_progress && self.requested.is_none() && !self.build_required
    }
}

/// Tracks running builds, queued follow-ups and the "build required" flag
///
/// At most one build per project is in progress. Requests that arrive while
/// one runs collapse into a single follow-up. Projects with nothing running,
/// queued or required are not kept.
#[derive(Debug, Default)]
pub struct BuildTracker {
    states: Mutex<HashMap<String, BuildState>>,
}

impl BuildTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a build in progress, or record a follow-up if one already is
    pub fn begin_or_queue(&self, project_id: &str, explicit: bool) -> BuildSlot {
        let mut states = self.states.lock();
        let state = states.entry(project_id.to_string()).or_default();
        if state.in_progress {
            let explicit = explicit || state.requested.map_or(false, |r| r.explicit);
            state.requested = Some(FollowUp { explicit });
            BuildSlot::Queued
        } else {
            state.in_progress = true;
            state.build_required = false;
            BuildSlot::Started
        }
    }

    /// End the running build
    ///
    /// A pending follow-up is consumed and returned, and the build stays in
    /// progress on behalf of it. Otherwise the project becomes idle.
    pub fn finish(&self, project_id: &str) -> Option<FollowUp> {
        let mut states = self.states.lock();
        let state = states.get_mut(project_id)?;
        if let Some(follow_up) = state.requested.take() {
            return Some(follow_up);
        }
        state.in_progress = false;
        if state.is_idle() {
            states.remove(project_id);
        }
        None
    }

    /// Drop the running build and any follow-up without building again
    pub fn abandon(&self, project_id: &str) {
        let mut states = self.states.lock();
        if let Some(state) = states.get_mut(project_id) {
            state.in_progress = false;
            state.requested = None;
            if state.is_idle() {
                states.remove(project_id);
            }
        }
    }

    pub fn is_build_in_progress(&self, project_id: &str) -> bool {
        self.states.lock().get(project_id).map_or(false, |s| s.in_progress)
    }

    pub fn is_build_requested(&self, project_id: &str) -> bool {
        self.states
            .lock()
            .get(project_id)
            .map_or(false, |s| s.requested.is_some())
    }

    pub fn set_build_required(&self, project_id: &str, required: bool) {
        let mut states = self.states.lock();
        if required {
            states.entry(project_id.to_string()).or_default().build_required = true;
        } else if let Some(state) = states.get_mut(project_id) {
            state.build_required = false;
            if state.is_idle() {
                states.remove(project_id);
            }
        }
    }

    pub fn is_build_required(&self, project_id: &str) -> bool {
        self.states.lock().get(project_id).map_or(false, |s| s.build_required)
    }
}

/// Receives project build status changes
///
/// Every method defaults to doing nothing.
pub trait StatusReporter: Send + Sync {
    /// Changes are waiting because auto-build is off
    fn build_required(&self, _project_id: &str, _required: bool) {}

    fn build_queued(&self, _project_id: &str) {}

    fn build_started(&self, _project_id: &str) {}

    fn build_finished(&self, _project_id: &str, _result: &anyhow::Result<BuildOutcome>) {}
}

/// Reports status changes as log events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn build_required(&self, project_id: &str, required: bool) {
        info!(project_id, required, "Build required status changed");
    }

    fn build_queued(&self, project_id: &str) {
        info!(project_id, "Build is in progress, follow-up build requested");
    }

    fn build_started(&self, project_id: &str) {
        info!(project_id, "Build started");
    }

    fn build_finished(&self, project_id: &str, result: &anyhow::Result<BuildOutcome>) {
        match result {
            Ok(outcome) => info!(project_id, ?outcome, "Build finished"),
            Err(e) => error!(project_id, "Build failed: {:#}", e),
        }
    }
}
