//! Feed ingestion for the `/api/medium-feed` endpoint.
//!
//! - **Fetching**: a single HTTP attempt against the configured feed URL
//! - **Parsing**: tolerant regex extraction of `<item>` records
//! - **Caching**: one in-process snapshot with a TTL and stale fallback
//!
//! # Architecture
//!
//! - [`fetcher`] - [`FeedSource`] trait and its reqwest implementation
//! - [`parser`] - raw markup to [`Article`] records
//! - [`cache`] - [`FeedCache`] trait, in-memory snapshot slot and clocks
//! - [`service`] - [`FeedService`], the fresh/refresh/stale decision
//!
//! # Example
//!
//! ```ignore
//! use medium_feed::feed::{FeedService, HttpFeedSource};
//!
//! let source = HttpFeedSource::new(reqwest::Client::new(), "https://medium.com/feed/@reelzila");
//! let service = Arc::new(FeedService::new(Arc::new(source)));
//! let outcome = service.articles().await?;
//! ```

pub mod cache;
pub mod fetcher;
pub mod parser;
pub mod service;
mod types;

pub use cache::{Clock, FeedCache, MemoryCache, SystemClock, DEFAULT_TTL};
pub use fetcher::{FeedSource, FetchError, HttpFeedSource, FEED_ACCEPT};
pub use parser::parse_feed;
pub use service::{FeedOutcome, FeedService};
pub use types::{Article, ArticlesBody, Snapshot};
