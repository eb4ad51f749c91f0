//! Common utilities for integration tests

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use cli_lib::{IpcServer, Services};
use container::{ContainerDetails, ContainerRuntime, ContainerState, PortMapping};
use pfw_core::{Config, ProjectInfo, ProjectInfoDir};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Container runtime that records calls and reports one canned container
pub struct FakeRuntime {
    state: ContainerState,
    details: Option<ContainerDetails>,
    calls: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn running(details: ContainerDetails) -> Self {
        Self {
            state: ContainerState::Active,
            details: Some(details),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn absent() -> Self {
        Self {
            state: ContainerState::NotFound,
            details: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn inspect(&self, _name: &str) -> Result<Option<ContainerDetails>> {
        Ok(self.details.clone())
    }

    async fn state(&self, _name: &str) -> Result<ContainerState> {
        Ok(self.state)
    }

    async fn build_image(&self, image: &str, _context: &Path, _options: &[String]) -> Result<()> {
        self.record(format!("build {}", image));
        Ok(())
    }

    async fn run_container(&self, name: &str) -> Result<()> {
        self.record(format!("run {}", name));
        Ok(())
    }

    async fn restart_container(&self, name: &str) -> Result<()> {
        self.record(format!("restart {}", name));
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.record(format!("remove {}", name));
        Ok(())
    }
}

pub fn web_container() -> ContainerDetails {
    ContainerDetails {
        id: "4f6c0e1d2b3a99887766".to_string(),
        ip: "172.18.0.4".to_string(),
        ports: PortMapping::from_pairs(vec![
            ("3000/tcp", vec!["32768"]),
            ("9229/tcp", vec!["32769"]),
        ]),
    }
}

/// A daemon wired to a fake runtime and a temporary project info directory
pub struct Daemon {
    pub server: IpcServer,
    pub runtime: Arc<FakeRuntime>,
    pub info_dir: Arc<ProjectInfoDir>,
    pub temp_dir: TempDir,
}

impl Daemon {
    pub fn new(runtime: FakeRuntime) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.projects.info_dir = temp_dir.path().join("projects");
        std::fs::create_dir_all(&config.projects.info_dir).unwrap();

        let runtime = Arc::new(runtime);
        let info_dir = Arc::new(ProjectInfoDir::new(&config.projects.info_dir));
        let services = Services::new(&config, info_dir.clone(), info_dir.clone(), runtime.clone());

        Self {
            server: IpcServer::new(Arc::new(services)),
            runtime,
            info_dir,
            temp_dir,
        }
    }

    /// Write a project info file and an empty project directory
    pub fn add_project(&self, id: &str, project_type: &str, configure: impl FnOnce(&mut ProjectInfo)) -> PathBuf {
        let location = self.temp_dir.path().join("workspace").join(id);
        std::fs::create_dir_all(&location).unwrap();
        let mut info = ProjectInfo::new(id, project_type, &location);
        configure(&mut info);
        std::fs::write(
            self.info_dir.info_file(id),
            serde_json::to_vec_pretty(&info).unwrap(),
        )
        .unwrap();
        location
    }

    pub async fn request(&self, line: &str) -> serde_json::Value {
        let reply = self.server.handle_message(line).await;
        serde_json::from_str(&reply).unwrap()
    }

    /// Poll until the runtime has seen `call` or give up after a few seconds
    pub async fn wait_for_call(&self, call: &str) -> bool {
        for _ in 0..200 {
            if self.runtime.calls().iter().any(|c| c == call) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

/// Runs the `pfw` binary
pub struct PfwCommand {
    args: Vec<String>,
    stdin_data: Option<String>,
}

pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl PfwCommand {
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            stdin_data: None,
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn stdin(&mut self, data: &str) -> &mut Self {
        self.stdin_data = Some(data.to_string());
        self
    }

    pub fn execute(&self) -> Result<CommandResult> {
        let mut command = Command::new(env!("CARGO_BIN_EXE_pfw"));
        command
            .args(&self.args)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().context("Failed to spawn pfw")?;
        if let Some(mut stdin) = child.stdin.take() {
            use std::io::Write;
            if let Some(data) = &self.stdin_data {
                stdin.write_all(data.as_bytes())?;
            }
        }
        let output = child.wait_with_output().context("Failed to wait for pfw")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }
        Ok(result)
    }

    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }
        Ok(result)
    }
}

/// Config file whose project info directory lives under `dir`
pub fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let info_dir = dir.join("projects");
    std::fs::create_dir_all(&info_dir).unwrap();
    let path = dir.join("config.toml");
    let body = format!(
        "[projects]\ninfo_dir = {:?}\n{}",
        info_dir.display().to_string(),
        extra
    );
    std::fs::write(&path, body).unwrap();
    path
}
