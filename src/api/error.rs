use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use thiserror::Error;

use crate::feed::FetchError;

/// Failures visible to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Upstream failed and there is no snapshot to fall back on.
    #[error("Failed to fetch articles")]
    FeedUnavailable(#[source] Arc<FetchError>),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::FeedUnavailable(_) => StatusCode::BAD_GATEWAY,
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
