#![cfg(feature = "http_api")]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    response::Response,
};
use case_schedule::{
    ComputedSchedule, InMemoryRepository, ProcessTemplate, RecordingNotifier, ReplanDiffEntry,
    ReplanEngine, SharedCalendar, StepDefinition, StepInstance, http_api,
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower::util::ServiceExt;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn new_router() -> axum::Router {
    let repository = Arc::new(InMemoryRepository::new());
    let engine = ReplanEngine::new(
        repository.clone(),
        Arc::new(RecordingNotifier::new()),
        SharedCalendar::default(),
    );
    let state = http_api::AppState::new(Arc::new(engine), repository);
    http_api::router(state)
}

fn filing_template() -> ProcessTemplate {
    ProcessTemplate::new(
        "filing",
        vec![
            StepDefinition::goal("step1", 1, -10),
            StepDefinition::after_previous("step2", 2, 3),
            StepDefinition::after_previous("step3", 3, 2),
        ],
    )
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = new_router();
    let response = send(&app, "GET", "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn case_lifecycle_via_http_api() {
    let app = new_router();

    let response = send(
        &app,
        "POST",
        "/templates",
        Some(serde_json::to_value(filing_template()).unwrap()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        &app,
        "POST",
        "/templates/filing/schedule",
        Some(json!({ "goal_date": "2025-12-31" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let schedule: ComputedSchedule = json_body(response).await;
    assert_eq!(schedule.due_date("step1"), Some(d(2025, 12, 17)));

    let response = send(
        &app,
        "POST",
        "/cases",
        Some(json!({ "case_id": "c-1", "template_id": "filing", "goal_date": "2025-12-31" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Vec<StepInstance> = json_body(response).await;
    assert_eq!(created.len(), 3);

    let response = send(
        &app,
        "PUT",
        "/cases/c-1/steps/step2/lock",
        Some(json!({ "locked": true })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let step: StepInstance = json_body(response).await;
    assert!(step.locked);

    let response = send(
        &app,
        "POST",
        "/cases/c-1/replan/preview",
        Some(json!({ "goal_date": "2026-01-15" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let diff: Vec<ReplanDiffEntry> = json_body(response).await;
    let changed: Vec<bool> = diff.iter().map(|e| e.changed).collect();
    assert_eq!(changed, vec![true, false, true]);

    let response = send(
        &app,
        "POST",
        "/cases/c-1/replan/apply",
        Some(json!({ "goal_date": "2026-01-15" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let applied: Vec<StepInstance> = json_body(response).await;
    assert_eq!(applied[0].due_date, d(2026, 1, 1));
    assert_eq!(applied[1].due_date, d(2025, 12, 22));

    let response = send(&app, "GET", "/cases/c-1/steps", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored: Vec<StepInstance> = json_body(response).await;
    assert_eq!(stored, applied);
}

#[tokio::test]
async fn cyclic_template_is_unprocessable() {
    let app = new_router();
    let template = ProcessTemplate::new(
        "looping",
        vec![
            StepDefinition::after("a", 1, 1, ["b"]),
            StepDefinition::after("b", 2, 1, ["a"]),
        ],
    );
    let response = send(
        &app,
        "POST",
        "/templates",
        Some(serde_json::to_value(template).unwrap()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "invalid_template");
}

#[tokio::test]
async fn out_of_range_offset_is_unprocessable() {
    let app = new_router();
    let template = ProcessTemplate::new("far", vec![StepDefinition::goal("step1", 1, 100_000_000)]);
    let response = send(
        &app,
        "POST",
        "/templates",
        Some(serde_json::to_value(template).unwrap()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "invalid_template");

    let response = send(
        &app,
        "POST",
        "/templates/far/schedule",
        Some(json!({ "goal_date": "2025-12-31" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_case_and_duplicate_case_errors() {
    let app = new_router();
    let response = send(
        &app,
        "POST",
        "/cases/nope/replan/preview",
        Some(json!({ "goal_date": "2026-01-15" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "not_found");

    send(
        &app,
        "POST",
        "/templates",
        Some(serde_json::to_value(filing_template()).unwrap()),
    )
    .await;
    let payload = json!({ "case_id": "c-1", "template_id": "filing", "goal_date": "2025-12-31" });
    let first = send(&app, "POST", "/cases", Some(payload.clone())).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = send(&app, "POST", "/cases", Some(payload)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn holidays_can_be_managed_over_http() {
    let app = new_router();

    let response = send(&app, "POST", "/holidays", Some(json!({ "date": "2025-12-17" }))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = send(&app, "POST", "/holidays", Some(json!({ "date": "2025-12-17" }))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "GET", "/holidays", None).await;
    let holidays: Vec<NaiveDate> = json_body(response).await;
    assert_eq!(holidays, vec![d(2025, 12, 17)]);

    send(
        &app,
        "POST",
        "/templates",
        Some(serde_json::to_value(filing_template()).unwrap()),
    )
    .await;
    let response = send(
        &app,
        "POST",
        "/templates/filing/schedule",
        Some(json!({ "goal_date": "2025-12-31" })),
    )
    .await;
    let schedule: ComputedSchedule = json_body(response).await;
    assert_eq!(schedule.due_date("step1"), Some(d(2025, 12, 16)));

    let response = send(&app, "POST", "/holidays/refresh", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json_body(response).await;
    assert_eq!(body["holidays"], 1);

    let response = send(&app, "DELETE", "/holidays/2025-12-17", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, "DELETE", "/holidays/2025-12-17", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
