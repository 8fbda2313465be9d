mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands, DownloadArgs};
use notegen::config::Config;
use notegen::download;
use notegen::engine::{CancellationRegistry, Engine, JobId, LogSink};
use notegen::observability::Metrics;
use tracing::warn;
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Server(args) => {
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            notegen::api::run(config).await?;
        }
        Commands::Download(args) => run_download(&config, args).await?,
    }

    Ok(())
}

async fn run_download(config: &Config, args: DownloadArgs) -> Result<(), AnyError> {
    let engine = Engine::new(Arc::new(CancellationRegistry::new()), Arc::new(Metrics::new()))
        .with_options(download::engine_options(&config.download, args.delay_ms));
    let job_id = JobId::generate();

    // Ctrl+C stops the batch before the next image; the partial summary still prints.
    let interrupt = {
        let engine = engine.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && engine.cancel(&job_id) {
                warn!(%job_id, "Interrupted, finishing the current download");
            }
        })
    };

    let result = download::download_results(
        &engine,
        &config.download,
        job_id,
        &args.input,
        &args.output_dir,
        &LogSink,
    )
    .await;
    interrupt.abort();
    let report = result?;

    for record in &report.items {
        if let Some(reason) = record.outcome.reason() {
            eprintln!("#{}: {reason}", record.index + 1);
        }
    }
    if report.is_cancelled() {
        eprintln!(
            "Cancelled after {} of {} images",
            report.completed_count(),
            report.total
        );
    }
    println!("{}", report.summary().describe("images"));

    Ok(())
}
