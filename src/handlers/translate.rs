use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{TranslateRequest, TranslateResponse};
use crate::prompts::translation_prompt;
use crate::state::AppState;

// Not rate limited: translation reuses text that already counted against the quota
pub async fn translate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::malformed("Invalid request data", e))?;
    request
        .validate()
        .map_err(|errors| ApiError::invalid("Invalid request data", errors))?;

    let translated_report = state
        .generate(translation_prompt(&request.report_text, &request.target_language))
        .await?
        .map_err(ApiError::Translation)?;

    Ok(Json(TranslateResponse { translated_report }))
}
