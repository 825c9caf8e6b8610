use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::models::{GeneralStatementForm, GeneralStatementRecord, ProcessedStatement};
use crate::prompts::general_statement_prompt;
use crate::state::AppState;

// Statements share the generation queue but not the report quota
pub async fn process_statement_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GeneralStatementForm>, JsonRejection>,
) -> Result<Json<ProcessedStatement>, ApiError> {
    let Json(form) = payload.map_err(|e| ApiError::malformed("Invalid statement data", e))?;
    form.validate()
        .map_err(|errors| ApiError::invalid("Invalid statement data", errors))?;

    let processed = state
        .generate(general_statement_prompt(&form))
        .await?
        .map_err(ApiError::StatementProcessing)?;

    let record = state.storage.create_statement(form, processed);
    info!(statement_id = record.id, "processed general statement");
    Ok(Json(ProcessedStatement::from(&record)))
}

pub async fn list_statements_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<GeneralStatementRecord>> {
    Json(state.storage.all_statements())
}

pub async fn get_statement_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GeneralStatementRecord>, ApiError> {
    let id: u64 = id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid statement ID"))?;
    state
        .storage
        .get_statement(id)
        .map(Json)
        .ok_or(ApiError::NotFound("Statement not found"))
}
