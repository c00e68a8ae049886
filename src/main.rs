//! Rotation worker entry point.
//!
//! One invocation performs one rotation: load the state document, tear down
//! the outgoing server, provision a fresh one on the standby account, migrate
//! the world data, start the server and commit the flipped document. The
//! process exit code is the only contract with the scheduler: zero for a
//! committed rotation, non-zero for anything else.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use boxrotate_orchestrator::{ControllerSettings, RotationController};
use boxrotate_session::HttpProvider;
use boxrotate_store::GistStore;
use boxrotate_transfer::{LftpTool, TransferPipeline};

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics belong on stderr; stdout stays clean for the scheduler.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // `{:#}` renders the whole cause chain on one line.
            error!("rotation failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = boxrotate_config::from_env().context("loading configuration")?;
    let settings = ControllerSettings::from_config(&config);

    let store = Arc::new(GistStore::new(config.gist_id.clone(), config.gh_token.clone()));
    let provider = Arc::new(HttpProvider::new());
    let migrator = Arc::new(TransferPipeline::new(LftpTool::new()));

    let controller = RotationController::new(store, provider, migrator, settings);
    let report = controller.run().await.context("rotation run")?;

    info!(
        new_active_index = report.new_active_index,
        server_id = %report.server_id,
        transfer = ?report.transfer,
        started = report.started,
        "Rotation complete"
    );
    if !report.started {
        info!("New server was provisioned but not started; start it manually");
    }
    Ok(())
}
