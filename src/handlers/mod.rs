use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

use crate::state::AppState;

mod admin;
mod feedback;
mod general_statement;
mod generate;
mod health;
mod metrics;
mod rate_limit;
mod translate;

pub use admin::{
    admin_feedback_analytics_handler, admin_feedback_handler, admin_feedback_stats_handler,
};
pub use feedback::{feedback_handler, feedback_track_handler};
pub use general_statement::{
    get_statement_handler, list_statements_handler, process_statement_handler,
};
pub use generate::generate_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use rate_limit::{quota_headers, rate_limit_status_handler};
pub use translate::translate_handler;

// All routes served by the gateway
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/rate-limit/status", get(rate_limit_status_handler))
        .route("/api/report/generate", post(generate_handler))
        .route("/api/report/translate", post(translate_handler))
        .route("/api/general-statement", get(list_statements_handler))
        .route("/api/general-statement/process", post(process_statement_handler))
        .route("/api/general-statement/{id}", get(get_statement_handler))
        .route("/api/feedback", post(feedback_handler))
        .route("/api/feedback/track", post(feedback_track_handler))
        .route("/api/admin/feedback", get(admin_feedback_handler))
        .route("/api/admin/feedback/stats", get(admin_feedback_stats_handler))
        .route("/api/admin/feedback/analytics", get(admin_feedback_analytics_handler))
        .with_state(state)
}
