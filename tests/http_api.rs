use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::{TimeDelta, TimeZone, Utc};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

use cna_report_gateway::completion::{CompletionError, CompletionRequest, TextGenerator};
use cna_report_gateway::handlers::router;
use cna_report_gateway::rate_limit::{
    AdmissionController, Clock, InMemoryWindowStore, ManualClock,
};
use cna_report_gateway::state::{AppState, StateOptions};
use tokio::sync::mpsc;

const ADMIN_TOKEN: &str = "test-admin";

// Answers with a fixed prefix and the first prompt line
struct StubGenerator;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let first_line = request.user.lines().next().unwrap_or_default();
        Ok(format!("GENERATED: {first_line}"))
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        Err(CompletionError::EmptyResponse)
    }
}

// Reports that it started, then never answers
struct HangingGenerator {
    started: mpsc::UnboundedSender<()>,
}

#[async_trait]
impl TextGenerator for HangingGenerator {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        let _ = self.started.send(());
        std::future::pending().await
    }
}

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

fn app_with(generator: Arc<dyn TextGenerator>, trust_forwarded_for: bool) -> TestApp {
    build_app(
        generator,
        StateOptions {
            trust_forwarded_for,
            admin_token: Some(ADMIN_TOKEN.to_string()),
            workers: 2,
            queue_capacity: 16,
        },
    )
}

fn build_app(generator: Arc<dyn TextGenerator>, options: StateOptions) -> TestApp {
    let clock = Arc::new(ManualClock::new(start()));
    let shared: Arc<dyn Clock> = clock.clone();
    let admission = AdmissionController::with_parts(
        InMemoryWindowStore::default(),
        shared,
        3,
        TimeDelta::hours(24),
    );
    let state = AppState::spawn(admission, generator, options);
    TestApp {
        router: router(state),
        clock,
    }
}

fn app() -> TestApp {
    app_with(Arc::new(StubGenerator), false)
}

fn peer(ip: [u8; 4]) -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from((ip, 51000)))
}

fn incident() -> Value {
    json!({
        "cnaName": "Dana Ruiz",
        "shiftTime": "7am-3pm",
        "floor": "3",
        "supervisorOnDuty": "R. Patel",
        "patientName": "J. Doe",
        "patientRoom": "312B",
        "incidentTime": "10:45",
        "incidentNature": "Fall",
        "incidentDescription": "Found on the floor beside the bed",
        "patientAbleToState": "yes",
        "patientStatement": "I slipped",
        "cnaActions": "Called the nurse and stayed with the patient",
        "supervisorNotified": "yes"
    })
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

fn generate_request(ip: [u8; 4], body: &Value) -> Request<Body> {
    let mut request = Request::post("/api/report/generate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    request.extensions_mut().insert(peer(ip));
    request
}

async fn generate_from(app: &TestApp, ip: [u8; 4], body: &Value) -> Response {
    send(app, generate_request(ip, body)).await
}

async fn post_json(app: &TestApp, uri: &str, body: Value) -> Response {
    let mut request = Request::post(uri)
        .header("content-type", "application/json")
        .header("user-agent", "gateway-tests/1.0")
        .body(Body::from(body.to_string()))
        .unwrap();
    request.extensions_mut().insert(peer([8, 8, 8, 8]));
    send(app, request).await
}

async fn get_path(app: &TestApp, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn admin_get(app: &TestApp, uri: &str) -> Response {
    let request = Request::get(uri)
        .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn status_for(app: &TestApp, ip: [u8; 4]) -> Value {
    let mut request = Request::get("/api/rate-limit/status").body(Body::empty()).unwrap();
    request.extensions_mut().insert(peer(ip));
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header(response: &Response, name: &str) -> String {
    response.headers()[name].to_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_healthy() {
    let app = app();
    let response = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn status_for_new_client_shows_full_quota() {
    let app = app();
    let status = status_for(&app, [1, 2, 3, 4]).await;
    assert_eq!(
        status,
        json!({
            "remaining": 3,
            "used": 0,
            "limit": 3,
            "resetTime": "2026-03-02T08:00:00.000Z"
        })
    );
}

#[tokio::test]
async fn three_reports_then_quota_exceeded() {
    let app = app();
    let ip = [1, 2, 3, 4];

    for expected_remaining in ["2", "1", "0"] {
        let response = generate_from(&app, ip, &incident()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(header(&response, "x-ratelimit-limit"), "3");
        assert_eq!(header(&response, "x-ratelimit-remaining"), expected_remaining);
        assert_eq!(header(&response, "x-ratelimit-reset"), "2026-03-02T08:00:00.000Z");

        let body = body_json(response).await;
        assert_eq!(body["report"]["cnaName"], "Dana Ruiz");
        assert!(
            body["report"]["generatedReport"]
                .as_str()
                .unwrap()
                .starts_with("GENERATED: Please generate a formal incident report")
        );
        app.clock.advance(TimeDelta::minutes(1));
    }

    let denied = generate_from(&app, ip, &incident()).await;
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&denied, "x-ratelimit-remaining"), "0");
    let body = body_json(denied).await;
    assert_eq!(body["error"], "Rate limit exceeded");
    assert_eq!(body["retryAfter"], "2026-03-02T08:00:00.000Z");
    assert_eq!(body["remaining"], 0);
    assert_eq!(body["used"], 3);
    assert_eq!(body["limit"], 3);

    // denial does not consume anything
    let again = generate_from(&app, ip, &incident()).await;
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(again).await["used"], 3);

    let status = status_for(&app, ip).await;
    assert_eq!(status["remaining"], 0);
    assert_eq!(status["used"], 3);
}

#[tokio::test]
async fn quota_comes_back_after_window() {
    let app = app();
    let ip = [1, 2, 3, 4];
    for _ in 0..3 {
        generate_from(&app, ip, &incident()).await;
    }
    assert_eq!(
        generate_from(&app, ip, &incident()).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    app.clock.advance(TimeDelta::hours(24) + TimeDelta::seconds(1));
    let response = generate_from(&app, ip, &incident()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(header(&response, "x-ratelimit-remaining"), "2");
    assert_eq!(header(&response, "x-ratelimit-reset"), "2026-03-03T08:00:01.000Z");
}

#[tokio::test]
async fn status_checks_do_not_consume_quota() {
    let app = app();
    let ip = [9, 9, 9, 9];
    for _ in 0..5 {
        status_for(&app, ip).await;
    }
    let response = generate_from(&app, ip, &incident()).await;
    assert_eq!(header(&response, "x-ratelimit-used"), "1");
    assert_eq!(status_for(&app, ip).await["remaining"], 2);
}

#[tokio::test]
async fn clients_have_separate_quotas() {
    let app = app();
    for _ in 0..3 {
        generate_from(&app, [10, 0, 0, 1], &incident()).await;
    }
    assert_eq!(
        generate_from(&app, [10, 0, 0, 1], &incident()).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        generate_from(&app, [10, 0, 0, 2], &incident()).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(status_for(&app, [10, 0, 0, 3]).await["used"], 0);
}

#[tokio::test]
async fn forwarded_for_is_used_when_trusted() {
    let app = app_with(Arc::new(StubGenerator), true);
    for _ in 0..3 {
        let mut request = Request::post("/api/report/generate")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::from(incident().to_string()))
            .unwrap();
        request.extensions_mut().insert(peer([10, 0, 0, 1]));
        assert_eq!(send(&app, request).await.status(), StatusCode::CREATED);
    }

    // the proxy address itself still has its full quota
    assert_eq!(status_for(&app, [10, 0, 0, 1]).await["used"], 0);

    let mut request = Request::get("/api/rate-limit/status")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap();
    request.extensions_mut().insert(peer([10, 0, 0, 1]));
    assert_eq!(body_json(send(&app, request).await).await["used"], 3);
}

#[tokio::test]
async fn invalid_form_is_rejected_after_admission() {
    let app = app();
    let ip = [4, 4, 4, 4];
    let mut form = incident();
    form["cnaName"] = json!("");
    form.as_object_mut().unwrap().remove("patientRoom");

    let response = generate_from(&app, ip, &form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(header(&response, "x-ratelimit-used"), "1");
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid request data");
    assert!(body["errors"]["cnaName"].is_string());
    assert!(body["errors"]["patientRoom"].is_string());

    assert_eq!(status_for(&app, ip).await["used"], 1);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app();
    let mut request = Request::post("/api/report/generate")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    request.extensions_mut().insert(peer([5, 5, 5, 5]));
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["errors"]["body"].is_string());
}

#[tokio::test]
async fn failed_generation_is_not_refunded() {
    let app = app_with(Arc::new(FailingGenerator), false);
    let ip = [6, 6, 6, 6];

    let response = generate_from(&app, ip, &incident()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["message"], "Error generating report");
    assert_eq!(status_for(&app, ip).await["used"], 1);
}

#[tokio::test]
async fn translate_returns_translated_text() {
    let app = app();
    let request = Request::post("/api/report/translate")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "reportText": "Patient fell at 10:45.", "targetLanguage": "es" }).to_string(),
        ))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["translatedReport"],
        "GENERATED: Patient fell at 10:45."
    );
}

#[tokio::test]
async fn translate_requires_text_and_language() {
    let app = app();
    let request = Request::post("/api/report/translate")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "reportText": "" }).to_string()))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["errors"]["reportText"].is_string());
    assert!(body["errors"]["targetLanguage"].is_string());
}

#[tokio::test]
async fn feedback_flows_into_admin_stats() {
    let app = app();
    let mut request = Request::post("/api/feedback")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "usefulness": 5,
                "easeOfUse": 4,
                "overallSatisfaction": 5,
                "mostHelpfulFeature": "Translation feature",
                "suggestedImprovements": "More languages"
            })
            .to_string(),
        ))
        .unwrap();
    request.extensions_mut().insert(peer([7, 7, 7, 7]));
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["feedback"]["id"], 1);

    let unauthorized = send(
        &app,
        Request::get("/api/admin/feedback/stats").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    let stats = send(
        &app,
        Request::get("/api/admin/feedback/stats")
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(stats.status(), StatusCode::OK);
    let stats = body_json(stats).await;
    assert_eq!(stats["totalResponses"], 1);
    assert_eq!(stats["averageUsefulness"], 5.0);
    assert_eq!(stats["topFeatures"][0]["feature"], "translation");

    let list = send(
        &app,
        Request::get("/api/admin/feedback")
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let list = body_json(list).await;
    assert_eq!(list[0]["ipAddress"], "7.7.7.7");
}

#[tokio::test]
async fn feedback_ratings_are_validated() {
    let app = app();
    let request = Request::post("/api/feedback")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "usefulness": 9,
                "easeOfUse": 4,
                "overallSatisfaction": 5,
                "mostHelpfulFeature": "x",
                "suggestedImprovements": "y"
            })
            .to_string(),
        ))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid feedback data");
    assert!(body["errors"]["usefulness"].is_string());
}

#[tokio::test]
async fn full_queue_is_503_and_still_spends_the_slot() {
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let app = build_app(
        Arc::new(HangingGenerator { started: started_tx }),
        StateOptions {
            trust_forwarded_for: false,
            admin_token: None,
            workers: 1,
            queue_capacity: 1,
        },
    );

    // the only worker picks this up and hangs
    let router = app.router.clone();
    let busy = tokio::spawn(router.oneshot(generate_request([1, 0, 0, 1], &incident())));
    started_rx.recv().await.unwrap();

    // this one waits in the queue's single slot
    let router = app.router.clone();
    let queued = tokio::spawn(router.oneshot(generate_request([1, 0, 0, 2], &incident())));
    while status_for(&app, [1, 0, 0, 2]).await["used"] != 1 {
        tokio::task::yield_now().await;
    }

    let ip = [1, 0, 0, 3];
    let response = generate_from(&app, ip, &incident()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(header(&response, "x-ratelimit-used"), "1");
    assert_eq!(
        body_json(response).await["message"],
        "Text generation is temporarily unavailable"
    );
    assert_eq!(status_for(&app, ip).await["used"], 1);
    assert_eq!(status_for(&app, ip).await["remaining"], 2);

    busy.abort();
    queued.abort();
}

fn statement() -> Value {
    json!({
        "residentName": "Mrs. Lee",
        "roomNumber": "204",
        "rawStatement": "resident refused breakfast and said she felt tired"
    })
}

#[tokio::test]
async fn statements_are_processed_listed_and_fetched() {
    let app = app();

    let response = post_json(&app, "/api/general-statement/process", statement()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let processed = body_json(response).await;
    assert_eq!(processed["processedStatement"], "GENERATED: Resident Name: Mrs. Lee");
    let id = processed["id"].as_u64().unwrap();
    assert!(processed["createdAt"].is_string());

    let mut second = statement();
    second["residentName"] = json!("Mr. Obi");
    post_json(&app, "/api/general-statement/process", second).await;

    let list = body_json(get_path(&app, "/api/general-statement").await).await;
    let names: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["residentName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Mrs. Lee", "Mr. Obi"]);

    let fetched = get_path(&app, &format!("/api/general-statement/{id}")).await;
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched = body_json(fetched).await;
    assert_eq!(fetched["roomNumber"], "204");
    assert_eq!(fetched["rawStatement"], statement()["rawStatement"]);
}

#[tokio::test]
async fn statements_do_not_touch_the_report_quota() {
    let app = app();
    for _ in 0..4 {
        let response = post_json(&app, "/api/general-statement/process", statement()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(status_for(&app, [8, 8, 8, 8]).await["used"], 0);
}

#[tokio::test]
async fn statement_lookup_errors() {
    let app = app();
    let missing = get_path(&app, "/api/general-statement/42").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["message"], "Statement not found");

    let bad_id = get_path(&app, "/api/general-statement/abc").await;
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(bad_id).await["message"], "Invalid statement ID");
}

#[tokio::test]
async fn short_statement_is_rejected() {
    let app = app();
    let response = post_json(
        &app,
        "/api/general-statement/process",
        json!({ "residentName": "", "rawStatement": "too short" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid statement data");
    assert!(body["errors"]["residentName"].is_string());
    assert!(body["errors"]["rawStatement"].is_string());
}

#[tokio::test]
async fn failed_statement_processing_is_500() {
    let app = app_with(Arc::new(FailingGenerator), false);
    let response = post_json(&app, "/api/general-statement/process", statement()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["message"], "Error processing statement");
    let list = body_json(get_path(&app, "/api/general-statement").await).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn tracked_events_feed_admin_analytics() {
    let app = app();
    for event in ["view", "view", "view", "submit"] {
        let response = post_json(&app, "/api/feedback/track", json!({ "eventType": event })).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let unknown = post_json(&app, "/api/feedback/track", json!({ "eventType": "click" })).await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let anonymous = get_path(&app, "/api/admin/feedback/analytics").await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let analytics = admin_get(&app, "/api/admin/feedback/analytics").await;
    assert_eq!(analytics.status(), StatusCode::OK);
    assert_eq!(
        body_json(analytics).await,
        json!({
            "totalViews": 3,
            "totalSubmissions": 1,
            "conversionRate": 33.3,
            "recentViews": 3,
            "recentSubmissions": 1,
            "recentConversionRate": 33.3
        })
    );
}

#[tokio::test]
async fn admin_feedback_list_is_oldest_first() {
    let app = app();
    for feature in ["first feature", "second feature"] {
        let response = post_json(
            &app,
            "/api/feedback",
            json!({
                "usefulness": 4,
                "easeOfUse": 4,
                "overallSatisfaction": 4,
                "mostHelpfulFeature": feature,
                "suggestedImprovements": "none"
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let list = body_json(admin_get(&app, "/api/admin/feedback").await).await;
    assert_eq!(list[0]["mostHelpfulFeature"], "first feature");
    assert_eq!(list[1]["mostHelpfulFeature"], "second feature");
}
