//! Project type to build handler lookup

use crate::builtin::{builtin_handlers, DockerProject};
use crate::{BuildHandler, DOCKER_TYPE};
use anyhow::Result;
use container::ContainerRuntime;
use parking_lot::RwLock;
use pfw_core::ProjectCapabilities;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Resolves project types to handlers
///
/// Resolution never fails: unknown types get the generic container handler.
/// Separately, the registry keeps the list of types advertised as supported,
/// which extensions add to and remove from without affecting resolution.
pub struct BuildHandlerRegistry {
    handlers: RwLock<Vec<Arc<dyn BuildHandler>>>,
    fallback: Arc<dyn BuildHandler>,
    supported: RwLock<Vec<String>>,
}

impl BuildHandlerRegistry {
    /// Registry with the given handlers and a custom fallback
    pub fn new(handlers: Vec<Arc<dyn BuildHandler>>, fallback: Arc<dyn BuildHandler>) -> Self {
        let supported = handlers
            .iter()
            .map(|h| h.supported_type().to_string())
            .collect();
        Self {
            handlers: RwLock::new(handlers),
            fallback,
            supported: RwLock::new(supported),
        }
    }

    /// Built-in handlers with the generic container fallback
    pub fn with_builtins(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self::new(
            builtin_handlers(runtime.clone()),
            Arc::new(DockerProject::new(runtime)),
        )
    }

    /// Handler for a project type, the fallback if none matches
    pub fn resolve(&self, project_type: &str) -> Arc<dyn BuildHandler> {
        self.handlers
            .read()
            .iter()
            .find(|h| h.supported_type() == project_type)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Add a handler; it takes precedence over existing handlers of its type
    pub fn register_handler(&self, handler: Arc<dyn BuildHandler>) {
        let project_type = handler.supported_type().to_string();
        self.handlers.write().insert(0, handler);
        self.register(&project_type);
    }

    /// Advertise a type as supported
    pub fn register(&self, project_type: &str) {
        let mut supported = self.supported.write();
        if !supported.iter().any(|t| t == project_type) {
            supported.push(project_type.to_string());
        }
        info!("Project type {} is now supported: {:?}", project_type, *supported);
    }

    /// Stop advertising a type; its handler, if any, stays resolvable
    pub fn unregister(&self, project_type: &str) {
        let mut supported = self.supported.write();
        if let Some(pos) = supported.iter().position(|t| t == project_type) {
            supported.remove(pos);
            info!("Project type {} has been removed: {:?}", project_type, *supported);
        }
    }

    pub fn is_supported(&self, project_type: &str) -> bool {
        project_type == DOCKER_TYPE || self.supported.read().iter().any(|t| t == project_type)
    }

    /// Advertised types followed by the fallback's type
    pub fn supported_types(&self) -> Vec<String> {
        let mut types = self.supported.read().clone();
        let fallback = self.fallback.supported_type();
        if !types.iter().any(|t| t == fallback) {
            types.push(fallback.to_string());
        }
        types
    }

    pub fn capabilities_for(&self, project_type: &str) -> ProjectCapabilities {
        self.resolve(project_type).capabilities()
    }

    /// Every non-fallback type whose detection accepts `location`
    pub async fn determine_project_types(&self, location: &Path) -> Result<Vec<String>> {
        info!("Determining project type for project at location: {}", location.display());

        let metadata = match tokio::fs::metadata(location).await {
            Ok(m) => m,
            Err(e) => anyhow::bail!("The location does not exist: {} ({})", location.display(), e),
        };

        let mut types = Vec::new();
        if metadata.is_dir() {
            let handlers = self.handlers.read().clone();
            for handler in handlers {
                if handler.type_matches(location).await {
                    types.push(handler.supported_type().to_string());
                }
            }
        }

        info!("The project location {} matched types: {:?}", location.display(), types);
        Ok(types)
    }
}
