//! Daemon plumbing shared by the `pfw` binary and its tests

pub mod daemon;
pub mod ipc;

pub use daemon::Services;
pub use ipc::{IpcServer, Request, Response};
