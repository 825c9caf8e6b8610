use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;

use crate::client_ip::ClientIdentity;
use crate::models::format_timestamp;
use crate::rate_limit::QuotaStatus;
use crate::state::AppState;

const LIMIT: &str = "x-ratelimit-limit";
const REMAINING: &str = "x-ratelimit-remaining";
const RESET: &str = "x-ratelimit-reset";
const USED: &str = "x-ratelimit-used";

// X-RateLimit-* headers describing the quota after this request
pub fn quota_headers(status: &QuotaStatus) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(LIMIT), HeaderValue::from(status.limit));
    headers.insert(HeaderName::from_static(REMAINING), HeaderValue::from(status.remaining));
    headers.insert(HeaderName::from_static(USED), HeaderValue::from(status.used));
    if let Ok(reset) = HeaderValue::from_str(&format_timestamp(&status.reset_time)) {
        headers.insert(HeaderName::from_static(RESET), reset);
    }
    headers
}

// Read-only quota display; never consumes a slot
pub async fn rate_limit_status_handler(
    State(state): State<Arc<AppState>>,
    ClientIdentity(identity): ClientIdentity,
) -> Json<QuotaStatus> {
    Json(state.admission.peek_status(&identity))
}
