//! CLI command implementations

pub mod config;
pub mod detect;
pub mod ports;
pub mod serve;

use anyhow::{Context, Result};
use pfw_core::Config;
use std::path::Path;

/// Load and validate the configuration
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}
