use axum::{
    extract::State,
    http::header::CACHE_CONTROL,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;
use crate::feed::{ArticlesBody, FeedOutcome};

/// `GET /api/medium-feed`
///
/// Fresh or refreshed snapshots carry the public `Cache-Control` header; a
/// stale fallback is sent without it so intermediaries revalidate next time.
pub async fn medium_feed(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let outcome = state
        .feed
        .articles()
        .await
        .map_err(ApiError::FeedUnavailable)?;

    Ok(articles_response(&state, &outcome))
}

fn articles_response(state: &AppState, outcome: &FeedOutcome) -> Response {
    let body = Json(ArticlesBody {
        articles: &outcome.snapshot().articles,
    });

    if outcome.is_cacheable() {
        ([(CACHE_CONTROL, state.cache_control.clone())], body).into_response()
    } else {
        body.into_response()
    }
}
