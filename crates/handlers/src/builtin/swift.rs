//! Swift projects
//!
//! Swift binaries are compiled into the image, so every change rebuilds.

use super::{file_exists, ContainerBuilder};
use crate::{BuildHandler, BuildOutcome, Operation};
use anyhow::Result;
use async_trait::async_trait;
use container::ContainerRuntime;
use pfw_core::FileChangeEvent;
use std::path::Path;
use std::sync::Arc;

pub struct SwiftProject {
    builder: ContainerBuilder,
}

impl SwiftProject {
    pub const TYPE: &'static str = "swift";

    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            builder: ContainerBuilder::new(runtime),
        }
    }
}

#[async_trait]
impl BuildHandler for SwiftProject {
    fn supported_type(&self) -> &str {
        Self::TYPE
    }

    async fn type_matches(&self, location: &Path) -> bool {
        file_exists(location, "Package.swift").await
    }

    async fn update(&self, operation: &Operation, _changed_files: Option<&[FileChangeEvent]>) -> Result<BuildOutcome> {
        self.builder.rebuild(operation).await
    }
}
