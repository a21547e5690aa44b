//! `grouplcmd run`: the long-running controller.

use std::path::Path;

use tokio::sync::watch;
use tracing::{info, warn};

use grouplcm_controller::Controller;
use grouplcm_core::LcmConfig;
use grouplcm_state::StateStore;

use crate::manifests;

pub async fn run(config: LcmConfig, manifest_dir: Option<&Path>) -> anyhow::Result<()> {
    info!("grouplcm daemon starting");

    std::fs::create_dir_all(&config.store.data_dir)?;
    let db_path = config.store.db_path();
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "object store opened");

    if let Some(dir) = manifest_dir {
        manifests::load_dir(&store, dir)?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller = Controller::new(store, &config.controller);
    let controller_handle = tokio::spawn(controller.run(shutdown_rx));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => warn!(error = %e, "failed to listen for ctrl-c, shutting down"),
    }
    let _ = shutdown_tx.send(true);

    controller_handle.await??;
    info!("grouplcm daemon stopped");
    Ok(())
}
