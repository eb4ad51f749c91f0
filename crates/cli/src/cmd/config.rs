//! Show the effective configuration

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use pfw_core::config::{config_file_path, example_config};
use std::path::Path;

pub fn run(config_path: Option<&Path>, example: bool) -> Result<()> {
    if example {
        print!("{}", example_config());
        return Ok(());
    }

    let config = super::load_config(config_path)?;
    let location = config_path.map(Path::to_path_buf).or_else(config_file_path);

    println!("{}", "Configuration".bold());
    match location {
        Some(path) if path.exists() => println!("{}: {}\n", "Location".dimmed(), path.display().dimmed()),
        Some(path) => println!("{}: {} {}\n", "Location".dimmed(), path.display().dimmed(), "(not found, defaults)".dimmed()),
        None => println!("{}\n", "Using defaults".dimmed()),
    }

    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    for line in rendered.lines() {
        if line.starts_with('[') {
            println!("{}", line.yellow());
        } else if let Some((key, value)) = line.split_once(" = ") {
            println!("{} = {}", key.cyan(), value);
        } else {
            println!("{}", line);
        }
    }

    println!("\n{}", "Valid Ranges:".bold());
    println!("  coordinator.debounce_ms: 10-600,000");
    Ok(())
}
