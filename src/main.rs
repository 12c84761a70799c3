use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use freshet::app::AppContext;
use freshet::cli::{commands, Cli, Command, DaemonAction};
use freshet::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("freshet=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let ctx = Arc::new(AppContext::new(config).context("Failed to initialize application")?);

    match cli.command {
        Command::Add { url } => commands::add(&ctx, &url).await?,
        Command::Remove { url } => commands::remove(&ctx, &url)?,
        Command::List { items } => commands::list(&ctx, items)?,
        Command::Sync { url, workers } => commands::sync(&ctx, url.as_deref(), workers).await?,
        Command::Audit => commands::audit(&ctx)?,
        Command::TrimUrls => commands::trim_urls(&ctx)?,
        Command::Daemon { action } => match action {
            DaemonAction::Start {
                interval,
                log_file,
                no_initial_sync,
            } => commands::daemon_start(ctx.clone(), &interval, log_file, no_initial_sync).await?,
            DaemonAction::Stop => commands::daemon_stop()?,
            DaemonAction::Status => commands::daemon_show_status(),
        },
    }

    Ok(())
}
