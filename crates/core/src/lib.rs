//! Shared model for the project update coordinator
//!
//! This crate provides:
//! - Project metadata (`ProjectInfo`) and the lookup contract used to read it
//! - File change events as delivered by the file watcher
//! - `.cw-settings` parsing and validation
//! - The compressed batch payload codec
//! - Daemon configuration

pub mod config;
pub mod payload;
pub mod project;
pub mod settings;
pub mod source;

// Re-exports
pub use config::Config;
pub use project::{
    ControlCommand, FileChangeEvent, ProjectCapabilities, ProjectInfo, StartMode,
};
pub use settings::{ProjectSettings, SettingsApplier, SettingsError};
pub use source::{LookupError, ProjectInfoDir, ProjectInfoSource};
