use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use frontpage_scorer::config;
use frontpage_scorer::db::SqlitePostStore;
use frontpage_scorer::health;
use frontpage_scorer::reddit::RedditClient;
use frontpage_scorer::scheduler::{self, ScheduleSettings};
use frontpage_scorer::{PipelineContext, PipelineSettings};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let store = SqlitePostStore::connect(&cfg.database_url()).await?;
    let source = RedditClient::from_config(&cfg)?;
    info!(authenticated = source.is_authenticated(), "reddit client ready");

    let ctx = PipelineContext::new(
        Arc::new(source),
        Arc::new(store),
        PipelineSettings::from_config(&cfg)?,
    );
    let schedule = ScheduleSettings::from_config(&cfg)?;

    let bind: SocketAddr = cfg
        .app
        .health_bind
        .parse()
        .context("invalid app.health_bind")?;
    tokio::spawn(async move {
        if let Err(err) = health::serve(bind).await {
            error!(?err, "health endpoint stopped");
        }
    });

    info!("starting front-page scorer");
    scheduler::run(ctx, schedule).await
}
