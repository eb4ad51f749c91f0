//! Service wiring for the daemon

use container::{ContainerPortResolver, ContainerRuntime, DockerCli};
use coordinator::{CoordinatorOptions, UpdateCoordinator};
use handlers::BuildHandlerRegistry;
use pfw_core::config::ContainerConfig;
use pfw_core::{Config, ProjectInfoDir, ProjectInfoSource, SettingsApplier};
use std::sync::Arc;
use tracing::info;

/// Everything a request handler needs
pub struct Services {
    pub coordinator: UpdateCoordinator,
    pub registry: Arc<BuildHandlerRegistry>,
    pub projects: Arc<dyn ProjectInfoSource>,
    pub ports: ContainerPortResolver,
    pub containers: ContainerConfig,
}

impl Services {
    /// Docker-backed services reading project info from the configured directory
    pub fn from_config(config: &Config) -> Self {
        let info_dir = Arc::new(ProjectInfoDir::new(&config.projects.info_dir));
        let runtime = Arc::new(DockerCli::new(&config.containers));
        info!(
            "Project info directory: {}, docker binary: {}",
            config.projects.info_dir.display(),
            config.containers.docker_binary
        );
        Self::new(config, info_dir.clone(), info_dir, runtime)
    }

    pub fn new(
        config: &Config,
        projects: Arc<dyn ProjectInfoSource>,
        settings: Arc<dyn SettingsApplier>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        let registry = Arc::new(BuildHandlerRegistry::with_builtins(runtime.clone()));
        let coordinator = UpdateCoordinator::builder(projects.clone(), registry.clone())
            .settings_applier(settings)
            .options(CoordinatorOptions::from_config(config))
            .build();

        Self {
            coordinator,
            registry,
            projects,
            ports: ContainerPortResolver::new(runtime),
            containers: config.containers.clone(),
        }
    }
}
