use anyhow::Context;
use clap::Parser;

use deribit_options::{Pipeline, PipelineError};

mod cli;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = cli::Cli::parse().into_config()?;
    log::debug!("{config:?}");

    // Single-threaded: each stage completes before the next one starts.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("creating async runtime")?;

    let mut pipeline = Pipeline::from_config(&config)?;
    rt.block_on(pipeline.run()).map_err(aborted)?;

    Ok(())
}

/// The one place a failed run is reported, via anyhow's `Error:` output.
fn aborted(err: PipelineError) -> anyhow::Error {
    let stage = err.stage();
    anyhow::Error::new(err).context(format!("aborted after {stage}"))
}
