//! `.cw-settings` parsing and validation
//!
//! The settings file sits at the root of a project and carries per-project
//! overrides (context root, ports, health check, watched files). A change to
//! it is applied directly and never starts a build.

use crate::ProjectInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

/// Name of the settings file at a project root
pub const SETTINGS_FILE_NAME: &str = ".cw-settings";

/// Settings validation failures
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid setting: Could not identify the setting: {0}")]
    InvalidSettingType(String),

    #[error("Invalid context root: Could not convert \"{0}\" to a string")]
    InvalidContextRoot(String),

    #[error("Invalid application port: Could not convert \"{0}\" to a number")]
    InvalidApplicationPort(String),

    #[error("Invalid debug port: Could not convert \"{0}\" to a number")]
    InvalidDebugPort(String),

    #[error("Invalid watched files: Could not convert \"{0}\" to an object")]
    InvalidWatchedFiles(String),

    #[error("Invalid health check: Could not convert \"{0}\" to a string")]
    InvalidHealthCheck(String),

    #[error("Invalid {key}: Could not convert \"{value}\" to {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// Every invalid field of one file, joined
    #[error("{0}")]
    InvalidSettings(String),

    #[error("settings file is not a JSON object")]
    NotAnObject,

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
}

/// Validated contents of a `.cw-settings` file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_app_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_debug_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched_files: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maven_profiles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maven_properties: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_https: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_ping_timeout: Option<String>,
}

impl ProjectSettings {
    /// Parse and validate settings JSON
    ///
    /// All invalid fields are collected and reported in a single
    /// `InvalidSettings` error.
    pub fn parse(data: &str) -> Result<Self, SettingsError> {
        let value: Value = serde_json::from_str(data)?;
        let Value::Object(fields) = value else {
            return Err(SettingsError::NotAnObject);
        };
        Self::from_fields(fields)
    }

    /// Read and validate a settings file
    pub async fn load(path: &Path) -> Result<Self, SettingsError> {
        let data = tokio::fs::read_to_string(path).await?;
        Self::parse(&data)
    }

    /// Copy the settings that live in project info; true if anything changed
    pub fn apply_to(&self, info: &mut ProjectInfo) -> bool {
        let before = info.clone();
        if let Some(context_root) = &self.context_root {
            info.context_root = Some(context_root.clone());
        }
        if let Some(port) = &self.internal_app_port {
            info.app_ports = vec![port.clone()];
        }
        if let Some(port) = &self.internal_debug_port {
            info.debug_port = Some(port.clone());
        }
        *info != before
    }

    fn from_fields(fields: Map<String, Value>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        let mut errors = Vec::new();

        for (key, value) in fields {
            if let Err(e) = settings.apply_field(&key, value) {
                errors.push(e.to_string());
            }
        }

        if errors.is_empty() {
            Ok(settings)
        } else {
            Err(SettingsError::InvalidSettings(errors.join(", ")))
        }
    }

    fn apply_field(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        match key {
            "contextRoot" => {
                self.context_root =
                    Some(as_string(&value).ok_or_else(|| SettingsError::InvalidContextRoot(display(&value)))?);
            }
            "internalAppPort" => {
                self.internal_app_port = Some(
                    as_port(&value).ok_or_else(|| SettingsError::InvalidApplicationPort(display(&value)))?,
                );
            }
            "internalDebugPort" => {
                self.internal_debug_port =
                    Some(as_port(&value).ok_or_else(|| SettingsError::InvalidDebugPort(display(&value)))?);
            }
            "healthCheck" => {
                self.health_check =
                    Some(as_string(&value).ok_or_else(|| SettingsError::InvalidHealthCheck(display(&value)))?);
            }
            "watchedFiles" => {
                if !value.is_object() {
                    return Err(SettingsError::InvalidWatchedFiles(display(&value)));
                }
                self.watched_files = Some(value);
            }
            "ignoredPaths" => self.ignored_paths = string_list(key, &value)?,
            "mavenProfiles" => self.maven_profiles = string_list(key, &value)?,
            "mavenProperties" => self.maven_properties = string_list(key, &value)?,
            "isHttps" => {
                self.is_https = Some(value.as_bool().ok_or_else(|| SettingsError::InvalidValue {
                    key: key.to_string(),
                    value: display(&value),
                    expected: "a boolean",
                })?);
            }
            "statusPingTimeout" => {
                self.status_ping_timeout = Some(as_port(&value).ok_or_else(|| SettingsError::InvalidValue {
                    key: key.to_string(),
                    value: display(&value),
                    expected: "a number",
                })?);
            }
            other => return Err(SettingsError::InvalidSettingType(other.to_string())),
        }
        Ok(())
    }
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Numbers and strings are both accepted for numeric settings
fn as_port(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>, SettingsError> {
    let invalid = || SettingsError::InvalidValue {
        key: key.to_string(),
        value: display(value),
        expected: "an array of strings",
    };
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| as_string(v).ok_or_else(invalid))
        .collect()
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Applies a project's new settings (the project metadata owner implements this)
#[async_trait]
pub trait SettingsApplier: Send + Sync {
    async fn apply(&self, project_id: &str, settings: ProjectSettings) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_valid_settings() {
        let data = r#"{
            "contextRoot": "/api",
            "internalAppPort": 9080,
            "internalDebugPort": "7777",
            "healthCheck": "/health",
            "watchedFiles": {"includeFiles": ["src/*"]},
            "ignoredPaths": ["*/node_modules*"],
            "isHttps": false
        }"#;

        let settings = ProjectSettings::parse(data).unwrap();
        assert_eq!(settings.context_root.as_deref(), Some("/api"));
        assert_eq!(settings.internal_app_port.as_deref(), Some("9080"));
        assert_eq!(settings.internal_debug_port.as_deref(), Some("7777"));
        assert_eq!(settings.health_check.as_deref(), Some("/health"));
        assert!(settings.watched_files.is_some());
        assert_eq!(settings.ignored_paths, vec!["*/node_modules*"]);
        assert_eq!(settings.is_https, Some(false));
    }

    #[test]
    fn test_invalid_fields_are_collected() {
        let data = r#"{"contextRoot": 12, "internalAppPort": true, "unknownKey": "x"}"#;

        let err = ProjectSettings::parse(data).unwrap_err();
        let SettingsError::InvalidSettings(msg) = err else {
            panic!("expected InvalidSettings, got {err:?}");
        };
        assert!(msg.contains("Invalid context root"));
        assert!(msg.contains("Invalid application port"));
        assert!(msg.contains("Could not identify the setting: unknownKey"));
    }

    #[test]
    fn test_watched_files_must_be_object() {
        let err = ProjectSettings::parse(r#"{"watchedFiles": "src"}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid watched files"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ProjectSettings::parse("{not json"),
            Err(SettingsError::Parse(_))
        ));
        assert!(matches!(
            ProjectSettings::parse("[1, 2]"),
            Err(SettingsError::NotAnObject)
        ));
    }

    #[test]
    fn test_apply_to_project_info() {
        let mut info = ProjectInfo::new("p1", "liberty", "/w/p1");
        let settings = ProjectSettings::parse(r#"{"contextRoot": "/api", "internalAppPort": 9080}"#).unwrap();

        assert!(settings.apply_to(&mut info));
        assert_eq!(info.context_root.as_deref(), Some("/api"));
        assert_eq!(info.app_ports, vec!["9080"]);
        assert_eq!(info.debug_port, None);

        assert!(!settings.apply_to(&mut info));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(SETTINGS_FILE_NAME),
            r#"{"contextRoot": "/"}"#,
        )
        .unwrap();

        let path = temp_dir.path().join(SETTINGS_FILE_NAME);
        let settings = ProjectSettings::load(&path).await.unwrap();
        assert_eq!(settings.context_root.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            ProjectSettings::load(&temp_dir.path().join(SETTINGS_FILE_NAME)).await,
            Err(SettingsError::Io(_))
        ));
    }
}
