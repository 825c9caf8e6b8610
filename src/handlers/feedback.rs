use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use crate::client_ip::ClientIdentity;
use crate::error::ApiError;
use crate::models::{FeedbackEventForm, FeedbackForm};
use crate::state::AppState;

pub async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    ClientIdentity(identity): ClientIdentity,
    payload: Result<Json<FeedbackForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(form) = payload.map_err(|e| ApiError::malformed("Invalid feedback data", e))?;
    form.validate()
        .map_err(|errors| ApiError::invalid("Invalid feedback data", errors))?;

    let record = state.storage.create_feedback(form, &identity);
    info!(feedback_id = record.id, "feedback submitted");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Feedback submitted successfully",
            "feedback": { "id": record.id }
        })),
    ))
}

// View/submit events from the feedback form, for the conversion numbers
pub async fn feedback_track_handler(
    State(state): State<Arc<AppState>>,
    ClientIdentity(identity): ClientIdentity,
    headers: HeaderMap,
    payload: Result<Json<FeedbackEventForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(form) = payload.map_err(|e| ApiError::malformed("Invalid event data", e))?;
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let record = state.storage.track_feedback_event(form, &identity, user_agent);
    debug!(event_id = record.id, event = ?record.event_type, "feedback event tracked");
    Ok((StatusCode::CREATED, Json(json!({ "id": record.id }))))
}
