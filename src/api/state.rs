use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::sync::Arc;

use crate::config::Config;
use crate::feed::{FeedService, HttpFeedSource};

/// Shared state handed to every request.
pub struct AppState {
    pub feed: Arc<FeedService>,
    /// `Cache-Control` value for fresh and refreshed responses.
    pub cache_control: HeaderValue,
}

impl AppState {
    pub fn new(feed: Arc<FeedService>, cache_control: &str) -> Result<Self> {
        let cache_control = HeaderValue::from_str(cache_control)
            .with_context(|| format!("Invalid Cache-Control value: {cache_control}"))?;
        Ok(Self {
            feed,
            cache_control,
        })
    }

    /// Wires the HTTP feed source, snapshot cache and orchestration from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let source = HttpFeedSource::new(client, config.feed_url.clone())
            .with_timeout(config.fetch_timeout())
            .with_revalidate(config.revalidate())
            .with_max_size(config.max_feed_bytes);

        let feed = FeedService::new(Arc::new(source))
            .with_ttl(config.cache_ttl())
            .with_single_flight(config.single_flight);

        Self::new(Arc::new(feed), &config.cache_control())
    }
}
