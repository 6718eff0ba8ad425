//! The worker process around the policy engine.

pub mod config;
pub mod scheduler;
pub mod signal;
pub mod walbc;

use std::path::PathBuf;

use clap::Parser;

use walb_worker_core::error::TypedResult;

use self::config::Config;
use self::scheduler::Worker;
use self::signal::ReloadFlag;
use self::walbc::WalbcClient;

/// Maintenance scheduler for walb archive nodes
#[derive(Debug, Parser)]
#[command(name = "walb-worker", version)]
struct Args {
    /// Path to the worker configuration file
    #[arg(short = 'f', value_name = "CONFIG")]
    config: PathBuf,
}

/// Loads the configuration, runs one selection pass and prints the selected
/// task, if any, to stdout.
pub fn run_worker() -> TypedResult<()> {
    let args = Args::parse();
    let reload = ReloadFlag::install()?;

    let cfg = Config::load(&args.config)?;
    debug!("configuration: {cfg:?}");

    let client = WalbcClient::new(&cfg.general.walbc_path);
    let worker = Worker::new(cfg, client);

    match worker.select_task()? {
        Some(task) => {
            info!("selected {task}");
            println!("{task}");
        }
        None => info!("no maintenance task to run"),
    }

    if reload.take() {
        info!("hangup received; a configuration reload was requested");
    }
    Ok(())
}
