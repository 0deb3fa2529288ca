//! upqueue command-line uploader entry point.

mod app;
mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();
    let mut config = config::Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        url = %config.url,
        max_parallel = config.queue.max_parallel,
        "starting upload"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(app::run(config, cli.paths))?;

    tracing::info!(
        uploaded = summary.uploaded,
        failed = summary.failed,
        canceled = summary.canceled,
        "upload finished"
    );
    if summary.failed > 0 {
        anyhow::bail!("{} file(s) failed to upload", summary.failed);
    }
    Ok(())
}
