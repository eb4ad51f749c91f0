//! Published port mapping and port resolution
//!
//! Declared application ports win when the container publishes them. Older
//! containers predate declared ports, so when nothing declared matches we
//! fall back to the first published port (skipping the debug port).

use crate::ContainerRuntime;
use anyhow::Result;
use pfw_core::ProjectInfo;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One internal port and the host ports bound to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Runtime key, e.g. `8080/tcp`
    pub key: String,
    pub host_ports: Vec<String>,
}

impl PortBinding {
    /// Port number part of the key
    pub fn internal_port(&self) -> &str {
        self.key.split('/').next().unwrap_or(self.key.as_str())
    }

    pub fn first_host_port(&self) -> Option<&str> {
        self.host_ports
            .first()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }
}

/// Internal port to host port table, in the order the runtime reported it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMapping {
    bindings: Vec<PortBinding>,
}

impl PortMapping {
    pub fn new(bindings: Vec<PortBinding>) -> Self {
        Self { bindings }
    }

    /// Build from `(key, host ports)` pairs
    pub fn from_pairs<K, P>(pairs: impl IntoIterator<Item = (K, Vec<P>)>) -> Self
    where
        K: Into<String>,
        P: Into<String>,
    {
        Self {
            bindings: pairs
                .into_iter()
                .map(|(key, ports)| PortBinding {
                    key: key.into(),
                    host_ports: ports.into_iter().map(Into::into).collect(),
                })
                .collect(),
        }
    }

    pub fn bindings(&self) -> &[PortBinding] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binding whose internal port number equals `port`
    pub fn find(&self, port: &str) -> Option<&PortBinding> {
        self.bindings.iter().find(|b| b.internal_port() == port)
    }

    pub fn internal_ports(&self) -> Vec<String> {
        self.bindings
            .iter()
            .map(|b| b.internal_port().to_string())
            .collect()
    }
}

/// Accepts docker's `{"HostIp": .., "HostPort": ..}` objects or bare port strings
#[derive(Deserialize)]
#[serde(untagged)]
enum HostBinding {
    Port(String),
    Docker {
        #[serde(rename = "HostPort", default)]
        host_port: String,
    },
}

impl<'de> Deserialize<'de> for PortMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = PortMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of internal ports to host bindings")
            }

            // Keys are kept in arrival order; the positional fallback depends on it
            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut bindings = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, hosts)) = access.next_entry::<String, Option<Vec<HostBinding>>>()? {
                    let host_ports = hosts
                        .unwrap_or_default()
                        .into_iter()
                        .map(|h| match h {
                            HostBinding::Port(p) => p,
                            HostBinding::Docker { host_port } => host_port,
                        })
                        .collect();
                    bindings.push(PortBinding { key, host_ports });
                }
                Ok(PortMapping { bindings })
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(PortMapping::default())
            }
        }

        deserializer.deserialize_any(MappingVisitor)
    }
}

/// Outcome of matching a mapping against a project's declared ports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPorts {
    pub internal_port: Option<String>,
    pub exposed_port: Option<String>,
    pub internal_debug_port: Option<String>,
    pub exposed_debug_port: Option<String>,
    /// Every internal port, matched or not
    pub container_ports: Vec<String>,
}

/// Determine the exposed application and debug ports
pub fn resolve_ports(mapping: &PortMapping, project: &ProjectInfo) -> ResolvedPorts {
    let mut resolved = ResolvedPorts {
        container_ports: mapping.internal_ports(),
        ..Default::default()
    };

    // 1. Declared app ports, first match with a bound host port wins
    let declared = project.app_ports.iter().find_map(|port| {
        let host = mapping.find(port)?.first_host_port()?;
        Some((port.clone(), host.to_string()))
    });

    // 2. Debug port, only meaningful in a debug start mode
    if project.start_mode.is_debug() {
        if let Some(debug_port) = project.debug_port.as_deref() {
            if let Some(binding) = mapping.find(debug_port) {
                resolved.internal_debug_port = Some(debug_port.to_string());
                resolved.exposed_debug_port = binding.first_host_port().map(str::to_string);
            }
        }
    }

    match declared {
        Some((internal, exposed)) => {
            resolved.internal_port = Some(internal);
            resolved.exposed_port = Some(exposed);
        }
        None => {
            // 3. Positional fallback for containers without declared ports
            let bindings = mapping.bindings();
            let mut candidate = bindings.first();
            if let (Some(first), Some(debug_port)) = (candidate, project.debug_port.as_deref()) {
                if first.internal_port() == debug_port && bindings.len() > 1 {
                    candidate = bindings.get(1);
                }
            }
            if let Some(binding) = candidate {
                if let Some(host) = binding.first_host_port() {
                    resolved.internal_port = Some(binding.internal_port().to_string());
                    resolved.exposed_port = Some(host.to_string());
                }
            }
        }
    }

    resolved
}

/// Network and port facts about a project's running container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub container_id: String,
    pub ip: String,
    pub exposed_port: Option<String>,
    pub internal_port: Option<String>,
    pub exposed_debug_port: Option<String>,
    pub internal_debug_port: Option<String>,
    pub container_ports: Vec<String>,
}

/// Resolves ports of live containers through a runtime
#[derive(Clone)]
pub struct ContainerPortResolver {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerPortResolver {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Port facts for `container_name`; empty when it is not running
    pub async fn resolve(&self, container_name: &str, project: &ProjectInfo) -> Result<ContainerInfo> {
        let Some(details) = self.runtime.inspect(container_name).await? else {
            debug!(project_id = %project.project_id, "Container {} is not running", container_name);
            return Ok(ContainerInfo::default());
        };

        let ports = resolve_ports(&details.ports, project);
        let info = ContainerInfo {
            container_id: details.id,
            ip: details.ip,
            exposed_port: ports.exposed_port,
            internal_port: ports.internal_port,
            exposed_debug_port: ports.exposed_debug_port,
            internal_debug_port: ports.internal_debug_port,
            container_ports: ports.container_ports,
        };

        info!(
            project_id = %project.project_id,
            internal_port = ?info.internal_port,
            exposed_port = ?info.exposed_port,
            internal_debug_port = ?info.internal_debug_port,
            exposed_debug_port = ?info.exposed_debug_port,
            container_ports = ?info.container_ports,
            "Resolved container ports"
        );
        Ok(info)
    }

    /// Whether the running container no longer exposes the declared debug port
    ///
    /// Any failure reports `true` so the caller rebuilds.
    pub async fn has_debug_port_changed(&self, container_name: &str, project: &ProjectInfo) -> bool {
        match self.runtime.inspect(container_name).await {
            Ok(Some(details)) => match project.debug_port.as_deref() {
                Some(port) => details.ports.find(port).is_none(),
                None => true,
            },
            Ok(None) => true,
            Err(e) => {
                warn!(project_id = %project.project_id, "Failed to inspect debug port: {:#}", e);
                true
            }
        }
    }
}
