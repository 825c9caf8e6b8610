use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::models::{FeedbackAnalytics, FeedbackRecord, FeedbackStats};
use crate::state::AppState;

// Compares every byte regardless of where the first mismatch is
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

fn authorize(headers: &HeaderMap, admin_token: Option<&str>) -> Result<(), ApiError> {
    let Some(token) = admin_token else {
        return Err(ApiError::Unauthorized);
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented.is_some_and(|p| tokens_match(p.as_bytes(), token.as_bytes())) {
        Ok(())
    } else {
        warn!("rejected admin request");
        Err(ApiError::Unauthorized)
    }
}

pub async fn admin_feedback_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<FeedbackRecord>>, ApiError> {
    authorize(&headers, state.admin_token.as_deref())?;
    Ok(Json(state.storage.all_feedback()))
}

pub async fn admin_feedback_stats_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<FeedbackStats>, ApiError> {
    authorize(&headers, state.admin_token.as_deref())?;
    Ok(Json(state.storage.feedback_stats()))
}

pub async fn admin_feedback_analytics_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<FeedbackAnalytics>, ApiError> {
    authorize(&headers, state.admin_token.as_deref())?;
    Ok(Json(state.storage.feedback_analytics(Utc::now())))
}
