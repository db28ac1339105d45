use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wuxi_ai_news::config::Config;
use wuxi_ai_news::pipeline;

/// Fetch the configured news feeds and write index.html and data.json
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "feeds.toml")]
    config: PathBuf,

    /// Directory for the output files, overriding `output.dir`
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wuxi_ai_news=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;
    if let Some(dir) = cli.out_dir {
        config.output.dir = dir;
    }
    info!(
        "Loaded {} feed sources from {}",
        config.feed_sources().len(),
        cli.config.display()
    );

    let report = pipeline::run(&config).await?;
    Ok(ExitCode::from(report.exit_status()))
}
