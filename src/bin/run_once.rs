use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use frontpage_scorer::config;
use frontpage_scorer::db::{self, SqlitePostStore};
use frontpage_scorer::fetcher::run_fetch_cycle;
use frontpage_scorer::reddit::RedditClient;
use frontpage_scorer::scorer::run_analyze_cycle;
use frontpage_scorer::{PipelineContext, PipelineSettings};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run one fetch cycle and one analyze cycle, then exit"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Do not fetch; only rescore what is already stored
    #[arg(long)]
    skip_fetch: bool,

    /// Do not rescore after fetching
    #[arg(long)]
    skip_analyze: bool,
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
    let pool = store.pool().clone();
    let ctx = PipelineContext::new(
        Arc::new(RedditClient::from_config(&cfg)?),
        Arc::new(store),
        PipelineSettings::from_config(&cfg)?,
    );

    if args.skip_fetch {
        info!("skipping fetch");
    } else if run_fetch_cycle(&ctx).await.is_none() {
        warn!("fetch cycle failed; scoring stored posts only");
    }

    if args.skip_analyze {
        info!("skipping analyze");
    } else {
        run_analyze_cycle(&ctx).await;
    }

    info!(stored_posts = db::count_posts(&pool).await?, "run complete");
    Ok(())
}
