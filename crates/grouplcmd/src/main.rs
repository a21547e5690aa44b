//! grouplcmd: the grouplcm daemon.
//!
//! Watches `Group` objects in a local object store and materializes each
//! group's batched rollout as placement rules, policies and bindings.
//!
//! # Usage
//!
//! ```text
//! grouplcmd run --config /etc/grouplcm/grouplcm.toml --manifests ./manifests
//! grouplcmd plan -f group.json
//! grouplcmd list --data-dir /var/lib/grouplcm --kind Policy
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use grouplcm_core::LcmConfig;
use grouplcmd::{commands, telemetry};

#[derive(Parser)]
#[command(
    name = "grouplcmd",
    about = "Batched policy rollout controller for site groups",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller until interrupted.
    Run {
        /// Path to grouplcm.toml. Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Data directory for the object store (overrides [store].data_dir).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Directory of *.json manifests to load before starting.
        #[arg(long)]
        manifests: Option<PathBuf>,

        /// Number of reconcile workers (overrides [controller].workers).
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print the batches and objects a group manifest would produce.
    Plan {
        /// Group manifest (JSON).
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List objects in the store.
    List {
        #[arg(long, default_value = "/var/lib/grouplcm")]
        data_dir: PathBuf,

        /// Only show objects of this kind.
        #[arg(short, long)]
        kind: Option<String>,

        /// Print full objects as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            data_dir,
            manifests,
            workers,
        } => {
            let mut config = match config {
                Some(path) => LcmConfig::from_file(&path)?,
                None => LcmConfig::default(),
            };
            if let Some(dir) = data_dir {
                config.store.data_dir = dir;
            }
            if let Some(n) = workers {
                anyhow::ensure!(n > 0, "--workers must be at least 1");
                config.controller.workers = n;
            }
            telemetry::init(&config.log)?;
            commands::run::run(config, manifests.as_deref()).await
        }
        Command::Plan { file } => {
            telemetry::init(&Default::default())?;
            commands::plan::plan(&file)
        }
        Command::List {
            data_dir,
            kind,
            json,
        } => {
            telemetry::init(&Default::default())?;
            commands::list::list(&data_dir, kind.as_deref(), json)
        }
    }
}
