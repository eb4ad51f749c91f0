//! JSON-lines request handling for the daemon
//!
//! Each input line is one request object tagged by `op`; each produces
//! exactly one response line carrying a `statusCode`.

use crate::daemon::Services;
use anyhow::{Context, Result};
use coordinator::{status_code, ChangeNotification, UpdateResult};
use pfw_core::payload::decode_events;
use pfw_core::{FileChangeEvent, LookupError, ProjectInfo};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Request {
    /// Explicit project update
    Update {
        #[serde(rename = "projectID", default)]
        project_id: Option<String>,
    },
    /// One chunk of a change batch, events inline or as a compressed `msg`
    Notify {
        #[serde(rename = "projectID", default)]
        project_id: Option<String>,
        #[serde(default)]
        timestamp: Option<u64>,
        #[serde(default)]
        chunk: Option<u32>,
        #[serde(default, alias = "chunkTotal")]
        chunk_total: Option<u32>,
        #[serde(default, alias = "eventArray")]
        events: Option<Vec<FileChangeEvent>>,
        #[serde(default)]
        msg: Option<String>,
    },
    /// Resolved ports of a project's container
    Ports {
        container: String,
        #[serde(rename = "projectID")]
        project_id: String,
    },
    /// Whether the container still exposes the declared debug port
    DebugPortChanged {
        container: String,
        #[serde(rename = "projectID")]
        project_id: String,
    },
    Capabilities {
        #[serde(rename = "projectType")]
        project_type: String,
    },
    Types,
    Detect { location: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            status_code: 200,
            message: None,
            data: Some(data),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: Some(message.into()),
            data: None,
        }
    }

    fn from_update(result: UpdateResult) -> Self {
        Self {
            status_code: status_code(&result),
            message: result.err().map(|e| e.to_string()),
            data: None,
        }
    }
}

/// Answers requests against the daemon services
#[derive(Clone)]
pub struct IpcServer {
    services: Arc<Services>,
}

impl IpcServer {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Serve requests until the reader reaches end of input
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read request")? {
            if line.trim().is_empty() {
                continue;
            }
            let mut reply = self.handle_message(&line).await;
            reply.push('\n');
            writer
                .write_all(reply.as_bytes())
                .await
                .context("Failed to write response")?;
            writer.flush().await?;
        }
        Ok(())
    }

    /// Handle one request line and render its response line
    pub async fn handle_message(&self, message: &str) -> String {
        let response = match serde_json::from_str::<Request>(message) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!("Malformed request: {}", e);
                Response::error(400, format!("Bad request: {}", e))
            }
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"statusCode":500,"message":"{}"}}"#, e))
    }

    pub async fn handle(&self, request: Request) -> Response {
        debug!(?request, "Handling request");
        let services = &self.services;

        match request {
            Request::Update { project_id } => {
                let project_id = project_id.unwrap_or_default();
                Response::from_update(services.coordinator.update_project(&project_id).await)
            }
            Request::Notify {
                project_id,
                timestamp,
                chunk,
                chunk_total,
                events,
                msg,
            } => {
                let events = match (events, msg) {
                    (Some(events), _) => Some(events),
                    (None, Some(msg)) => match decode_events(&msg) {
                        Ok(events) => Some(events),
                        Err(e) => return Response::error(400, format!("Bad request: {}", e)),
                    },
                    (None, None) => None,
                };
                let notification = ChangeNotification {
                    project_id,
                    timestamp,
                    chunk,
                    chunk_total,
                    events,
                };
                Response::from_update(services.coordinator.notify_change(notification).await)
            }
            Request::Ports { container, project_id } => {
                let project = match self.project(&project_id).await {
                    Ok(project) => project,
                    Err(response) => return response,
                };
                match services.ports.resolve(&container, &project).await {
                    Ok(info) => Response::ok(json!(info)),
                    Err(e) => Response::error(500, format!("{:#}", e)),
                }
            }
            Request::DebugPortChanged { container, project_id } => {
                let project = match self.project(&project_id).await {
                    Ok(project) => project,
                    Err(response) => return response,
                };
                let changed = services.ports.has_debug_port_changed(&container, &project).await;
                Response::ok(json!({ "changed": changed }))
            }
            Request::Capabilities { project_type } => {
                Response::ok(json!(services.registry.capabilities_for(&project_type)))
            }
            Request::Types => Response::ok(json!(services.registry.supported_types())),
            Request::Detect { location } => match services.registry.determine_project_types(&location).await {
                Ok(types) => Response::ok(json!(types)),
                Err(e) => Response::error(400, format!("{:#}", e)),
            },
        }
    }

    async fn project(&self, project_id: &str) -> Result<ProjectInfo, Response> {
        match self.services.projects.read_project_info(project_id).await {
            Ok(project) => Ok(project),
            Err(e @ LookupError::NotFound(_)) => Err(Response::error(404, e.to_string())),
            Err(e) => Err(Response::error(500, e.to_string())),
        }
    }
}
