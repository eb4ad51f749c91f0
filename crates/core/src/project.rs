//! Project metadata and file change events

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// How the application inside a project's container is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StartMode {
    #[default]
    #[serde(rename = "run")]
    Run,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "debugNoInit")]
    DebugNoInit,
}

impl StartMode {
    /// True for both debug variants
    pub fn is_debug(self) -> bool {
        matches!(self, StartMode::Debug | StartMode::DebugNoInit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StartMode::Run => "run",
            StartMode::Debug => "debug",
            StartMode::DebugNoInit => "debugNoInit",
        }
    }
}

/// Container control commands a project type may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Start,
    Stop,
    Restart,
}

/// What a project type can do at runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCapabilities {
    pub start_modes: Vec<StartMode>,
    pub control_commands: Vec<ControlCommand>,
}

impl ProjectCapabilities {
    pub fn new(start_modes: Vec<StartMode>, control_commands: Vec<ControlCommand>) -> Self {
        Self {
            start_modes,
            control_commands,
        }
    }

    pub fn supports(&self, mode: StartMode) -> bool {
        self.start_modes.contains(&mode)
    }
}

impl Default for ProjectCapabilities {
    fn default() -> Self {
        Self {
            start_modes: vec![StartMode::Run],
            control_commands: vec![
                ControlCommand::Start,
                ControlCommand::Stop,
                ControlCommand::Restart,
            ],
        }
    }
}

/// Identity and configuration of a single project
///
/// Owned by the project metadata store. The coordinator only ever reads a
/// snapshot of it per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(rename = "projectID")]
    pub project_id: String,

    #[serde(rename = "projectType")]
    pub project_type: String,

    #[serde(rename = "projectName", default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Filesystem root of the project
    pub location: PathBuf,

    #[serde(rename = "autoBuildEnabled", default = "default_auto_build")]
    pub auto_build_enabled: bool,

    #[serde(rename = "appPorts", default, deserialize_with = "ports_from_json")]
    pub app_ports: Vec<String>,

    #[serde(
        rename = "debugPort",
        default,
        deserialize_with = "optional_port_from_json",
        skip_serializing_if = "Option::is_none"
    )]
    pub debug_port: Option<String>,

    #[serde(rename = "startMode", default)]
    pub start_mode: StartMode,

    #[serde(rename = "contextRoot", default, skip_serializing_if = "Option::is_none")]
    pub context_root: Option<String>,
}

fn default_auto_build() -> bool {
    true
}

impl ProjectInfo {
    /// Minimal project with auto build on and no declared ports
    pub fn new(
        project_id: impl Into<String>,
        project_type: impl Into<String>,
        location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            project_type: project_type.into(),
            project_name: None,
            location: location.into(),
            auto_build_enabled: true,
            app_ports: Vec::new(),
            debug_port: None,
            start_mode: StartMode::Run,
            context_root: None,
        }
    }

    /// Path of a file relative to the project root
    pub fn path_of(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.location.join(relative)
    }
}

/// One file system change reported by the watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeEvent {
    pub path: String,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub directory: bool,
}

impl FileChangeEvent {
    pub fn new(path: impl Into<String>, timestamp: u64, kind: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            timestamp,
            kind: kind.into(),
            directory: false,
        }
    }

    /// Final path component, tolerant of both separators
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.path.as_str())
    }

    /// Whether this event touches the file with the given name
    pub fn is_file_named(&self, name: &str) -> bool {
        !self.directory && self.file_name() == name
    }
}

/// Ports are written both as JSON numbers and strings in project info files
#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Text(String),
    Number(u64),
}

impl PortValue {
    fn into_string(self) -> String {
        match self {
            PortValue::Text(s) => s,
            PortValue::Number(n) => n.to_string(),
        }
    }
}

fn ports_from_json<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let ports: Option<Vec<PortValue>> = Option::deserialize(deserializer)?;
    Ok(ports
        .unwrap_or_default()
        .into_iter()
        .map(PortValue::into_string)
        .collect())
}

fn optional_port_from_json<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let port: Option<PortValue> = Option::deserialize(deserializer)?;
    Ok(port.map(PortValue::into_string).filter(|p| !p.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_info_from_json() {
        let json = r#"{
            "projectID": "be4ea4e0",
            "projectType": "nodejs",
            "location": "/codewind-workspace/node1",
            "autoBuildEnabled": false,
            "appPorts": [3000, "9080"],
            "debugPort": 9229,
            "startMode": "debugNoInit"
        }"#;

        let info: ProjectInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.project_id, "be4ea4e0");
        assert_eq!(info.project_type, "nodejs");
        assert!(!info.auto_build_enabled);
        assert_eq!(info.app_ports, vec!["3000", "9080"]);
        assert_eq!(info.debug_port.as_deref(), Some("9229"));
        assert_eq!(info.start_mode, StartMode::DebugNoInit);
        assert!(info.start_mode.is_debug());
    }

    #[test]
    fn test_project_info_defaults() {
        let json = r#"{"projectID": "p1", "projectType": "docker", "location": "/tmp/p1"}"#;
        let info: ProjectInfo = serde_json::from_str(json).unwrap();

        assert!(info.auto_build_enabled);
        assert!(info.app_ports.is_empty());
        assert_eq!(info.debug_port, None);
        assert_eq!(info.start_mode, StartMode::Run);
    }

    #[test]
    fn test_empty_debug_port_is_none() {
        let json = r#"{"projectID": "p1", "projectType": "docker", "location": "/p", "debugPort": ""}"#;
        let info: ProjectInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.debug_port, None);
    }

    #[test]
    fn test_event_file_name() {
        let event = FileChangeEvent::new("/workspace/node1/.cw-settings", 1, "MODIFY");
        assert_eq!(event.file_name(), ".cw-settings");
        assert!(event.is_file_named(".cw-settings"));

        let nested = FileChangeEvent::new("src/.cw-settings.bak", 1, "MODIFY");
        assert!(!nested.is_file_named(".cw-settings"));

        let bare = FileChangeEvent::new("Dockerfile", 1, "CREATE");
        assert_eq!(bare.file_name(), "Dockerfile");
    }

    #[test]
    fn test_event_wire_format() {
        let json = r#"{"path": "/p/server.js", "timestamp": 1560000, "type": "MODIFY", "directory": false}"#;
        let event: FileChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, "MODIFY");
        assert_eq!(event.timestamp, 1560000);
    }
}
