//! Detect project types at a path

use anyhow::Result;
use cli_lib::Services;
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, path: &Path) -> Result<()> {
    let config = super::load_config(config_path)?;
    let services = Services::from_config(&config);

    let types = services.registry.determine_project_types(path).await?;
    if types.is_empty() {
        println!("{}", "No known project type".yellow());
        println!("  {}", "Tip: any directory with a Dockerfile builds as 'docker'".dimmed());
        return Ok(());
    }

    for project_type in types {
        let capabilities = services.registry.capabilities_for(&project_type);
        let modes: Vec<_> = capabilities.start_modes.iter().map(|m| m.as_str()).collect();
        println!("{}  {}", project_type.green(), format!("start modes: {}", modes.join(", ")).dimmed());
    }
    Ok(())
}
