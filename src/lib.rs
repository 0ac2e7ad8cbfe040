//! Cached, tolerant RSS feed endpoint.
//!
//! Serves `GET /api/medium-feed`: the articles of one upstream RSS feed,
//! parsed with tag-scoped regular expressions and held in a single
//! in-process snapshot with a TTL and stale-on-error fallback.

pub mod api;
pub mod config;
pub mod feed;
pub mod util;
