//! Show resolved container ports for a project

use anyhow::{Context, Result};
use cli_lib::Services;
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, container: &str, project_id: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let services = Services::from_config(&config);

    let project = services
        .projects
        .read_project_info(project_id)
        .await
        .with_context(|| format!("Failed to read project info for {}", project_id))?;
    let info = services.ports.resolve(container, &project).await?;

    println!("{}", format!("Container {}", container).bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if info.container_id.is_empty() {
        println!("{}", "Not running".yellow());
        return Ok(());
    }

    let short_id: String = info.container_id.chars().take(12).collect();
    println!("ID:            {}", short_id.yellow());
    println!("IP:            {}", info.ip.cyan());
    println!(
        "App port:      {}",
        port_pair(info.internal_port.as_deref(), info.exposed_port.as_deref())
    );
    if project.start_mode.is_debug() {
        println!(
            "Debug port:    {}",
            port_pair(info.internal_debug_port.as_deref(), info.exposed_debug_port.as_deref())
        );
    }
    println!("All ports:     {}", info.container_ports.join(", ").dimmed());
    Ok(())
}

fn port_pair(internal: Option<&str>, exposed: Option<&str>) -> String {
    match (internal, exposed) {
        (Some(internal), Some(exposed)) => format!("{} -> {}", internal, exposed.green()),
        _ => "none".dimmed().to_string(),
    }
}
