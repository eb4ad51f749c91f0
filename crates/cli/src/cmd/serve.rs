//! Run the daemon on stdin/stdout

use anyhow::Result;
use cli_lib::{IpcServer, Services};
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let services = Arc::new(Services::from_config(&config));
    let server = IpcServer::new(services.clone());

    info!(
        "Serving requests on stdin (quiet period {:?}, supported types {:?})",
        config.coordinator.debounce(),
        services.registry.supported_types()
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = server.serve(stdin, stdout) => {
            result?;
            info!("Input closed, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    services.coordinator.shutdown();
    Ok(())
}
