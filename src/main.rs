use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use medium_feed::api::{self, AppState};
use medium_feed::config::Config;
use medium_feed::feed::ArticlesBody;

#[derive(Parser, Debug)]
#[command(name = "medium-feed", about = "Cached RSS feed endpoint")]
struct Args {
    /// TOML config file (defaults are used when absent)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address, overrides `bind_address`
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Upstream feed URL, overrides `feed_url`
    #[arg(long, value_name = "URL")]
    feed_url: Option<String>,

    /// Fetch and parse the feed once, print the JSON body and exit
    #[arg(long)]
    print: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(feed_url) = args.feed_url {
        config.feed_url = feed_url;
    }
    config.validate().context("Invalid configuration")?;

    let state = AppState::from_config(&config)?;

    if args.print {
        let outcome = state
            .feed
            .articles()
            .await
            .context("Failed to fetch feed")?;
        let json = serde_json::to_string_pretty(&ArticlesBody {
            articles: &outcome.snapshot().articles,
        })?;
        println!("{json}");
        return Ok(());
    }

    api::serve(&config.bind_address, state).await
}
