use serde::Serialize;
use std::time::Instant;

/// One feed entry as served by `GET /api/medium-feed`.
///
/// Every field is the raw extracted text; nothing is parsed into richer
/// types. Missing tags leave the field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Article {
    pub title: String,
    /// Publication date exactly as it appears in `<pubDate>`.
    #[serde(rename = "pubDate")]
    pub published_at: String,
    pub link: String,
    pub guid: String,
    pub author: String,
    /// `src` of the first image in the description, or empty.
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    /// Raw HTML snippet.
    pub description: String,
    /// Category labels in document order, duplicates kept.
    pub categories: Vec<String>,
}

/// The single cached parse result plus the instant it was fetched.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub articles: Vec<Article>,
    pub fetched_at: Instant,
}

impl Snapshot {
    pub fn new(articles: Vec<Article>, fetched_at: Instant) -> Self {
        Self {
            articles,
            fetched_at,
        }
    }

    /// Age of the snapshot at `now`. Saturates to zero if `now` precedes the fetch.
    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.fetched_at)
    }
}

/// Response body for a successful feed request, borrowed from a snapshot.
#[derive(Debug, Serialize)]
pub struct ArticlesBody<'a> {
    pub articles: &'a [Article],
}
