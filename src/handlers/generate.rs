use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::client_ip::ClientIdentity;
use crate::error::ApiError;
use crate::handlers::quota_headers;
use crate::metrics::{ACTIVE_WINDOWS, ADMISSIONS, DENIALS, REQUEST_TOTAL};
use crate::models::IncidentReportForm;
use crate::prompts::incident_report_prompt;
use crate::rate_limit::Decision;
use crate::state::AppState;

// Admission runs before the body is looked at, so a rejected body still
// spends a slot. Failed generations are not refunded either.
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    ClientIdentity(identity): ClientIdentity,
    payload: Result<Json<IncidentReportForm>, JsonRejection>,
) -> Response {
    REQUEST_TOTAL.inc();

    let decision = state.admission.check_and_admit(&identity);
    ACTIVE_WINDOWS.set(state.admission.tracked_identities() as f64);
    let status = match decision {
        Decision::Admitted(status) => {
            ADMISSIONS.inc();
            status
        }
        Decision::Denied(status) => {
            DENIALS.inc();
            return ApiError::QuotaExceeded(status).into_response();
        }
    };

    let outcome = generate_report(&state, payload).await;
    (quota_headers(&status), outcome).into_response()
}

async fn generate_report(
    state: &AppState,
    payload: Result<Json<IncidentReportForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(form) = payload.map_err(|e| ApiError::malformed("Invalid request data", e))?;
    form.validate()
        .map_err(|errors| ApiError::invalid("Invalid request data", errors))?;

    let generated = state
        .generate(incident_report_prompt(&form))
        .await?
        .map_err(ApiError::Generation)?;

    let report = state.storage.create_report(form, generated);
    info!(report_id = report.id, "generated incident report");
    Ok((StatusCode::CREATED, Json(json!({ "report": report }))))
}
