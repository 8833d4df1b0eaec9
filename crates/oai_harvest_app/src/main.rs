use std::path::PathBuf;

use anyhow::Context;
use engine_logging::engine_error;
use oai_harvest_core::RunStatus;

mod config;
mod run;

use config::{HarvestConfig, DEFAULT_CONFIG};

fn main() -> anyhow::Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = HarvestConfig::load(&path)?;
    engine_logging::initialize(config.log.destination(), config.log.level_filter()?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let (report, _summary) = runtime.block_on(run::run(&config))?;

    match report.status {
        RunStatus::Failed { reason } => {
            engine_error!("harvest stopped early: {}", reason);
            Err(anyhow::anyhow!("harvest of {} failed: {reason}", config.endpoint))
        }
        _ => Ok(()),
    }
}
