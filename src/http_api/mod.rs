use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    ComputedSchedule, HolidayStore, ProcessTemplate, ReplanDiffEntry, ReplanEngine,
    RepositoryError, ScheduleError, ScheduleWarning, StepInstance,
};

#[derive(Clone)]
pub struct AppState {
    engine: Arc<ReplanEngine>,
    holidays: Arc<dyn HolidayStore>,
}

impl AppState {
    pub fn new(engine: Arc<ReplanEngine>, holidays: Arc<dyn HolidayStore>) -> Self {
        Self { engine, holidays }
    }

    fn engine(&self) -> Arc<ReplanEngine> {
        self.engine.clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Unprocessable(String),
    Internal(String),
}

impl From<ScheduleError> for ApiError {
    fn from(value: ScheduleError) -> Self {
        let message = value.to_string();
        match value {
            ScheduleError::CaseNotFound { .. }
            | ScheduleError::TemplateNotFound { .. }
            | ScheduleError::StepNotFound { .. } => ApiError::NotFound(message),
            ScheduleError::ConcurrentModification { .. }
            | ScheduleError::CaseAlreadyExists { .. }
            | ScheduleError::InvalidTransition { .. } => ApiError::Conflict(message),
            ref err if err.is_template_error() => ApiError::Unprocessable(message),
            ScheduleError::InvalidCalendar(_) => ApiError::Invalid(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(value: RepositoryError) -> Self {
        ApiError::from(ScheduleError::from(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Unprocessable(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_template",
                message,
            ),
            ApiError::Internal(message) => {
                tracing::error!(%message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct GoalDatePayload {
    goal_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct CreateCasePayload {
    case_id: String,
    template_id: String,
    goal_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct HolidayPayload {
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct LockPayload {
    locked: bool,
}

#[derive(Debug, Serialize)]
struct TemplateRegistered {
    template_id: String,
    warnings: Vec<ScheduleWarning>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/holidays", get(list_holidays).post(add_holiday))
        .route("/holidays/refresh", post(refresh_holidays))
        .route("/holidays/:date", delete(remove_holiday))
        .route("/templates", post(register_template))
        .route("/templates/:id/schedule", post(compute_schedule))
        .route("/cases", post(create_case))
        .route("/cases/:id/steps", get(list_case_steps))
        .route("/cases/:id/steps/:step_id/lock", put(set_step_lock))
        .route("/cases/:id/replan/preview", post(preview_replan))
        .route("/cases/:id/replan/apply", post(apply_replan))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_holidays(State(state): State<AppState>) -> Json<Vec<NaiveDate>> {
    Json(state.engine.calendar().snapshot().holidays())
}

async fn add_holiday(
    State(state): State<AppState>,
    Json(payload): Json<HolidayPayload>,
) -> Result<StatusCode, ApiError> {
    state.holidays.add_holiday(payload.date)?;
    let added = state.engine.calendar().add_holiday(payload.date);
    Ok(if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    })
}

async fn remove_holiday(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<StatusCode, ApiError> {
    let stored = state.holidays.remove_holiday(date)?;
    let removed = state.engine.calendar().remove_holiday(date);
    if !stored && !removed {
        return Err(ApiError::NotFound(format!("{date} is not a holiday")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh_holidays(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state
        .engine
        .calendar()
        .refresh_from(state.holidays.as_ref())?;
    Ok(Json(json!({ "holidays": count })))
}

async fn register_template(
    State(state): State<AppState>,
    Json(template): Json<ProcessTemplate>,
) -> Result<(StatusCode, Json<TemplateRegistered>), ApiError> {
    let warnings = state.engine().register_template(&template)?;
    Ok((
        StatusCode::CREATED,
        Json(TemplateRegistered {
            template_id: template.id,
            warnings,
        }),
    ))
}

async fn compute_schedule(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(payload): Json<GoalDatePayload>,
) -> Result<Json<ComputedSchedule>, ApiError> {
    let schedule = state
        .engine()
        .compute_initial_schedule(&template_id, payload.goal_date)?;
    Ok(Json(schedule))
}

async fn create_case(
    State(state): State<AppState>,
    Json(payload): Json<CreateCasePayload>,
) -> Result<(StatusCode, Json<Vec<StepInstance>>), ApiError> {
    let steps = state.engine().create_case(
        &payload.case_id,
        &payload.template_id,
        payload.goal_date,
    )?;
    Ok((StatusCode::CREATED, Json(steps)))
}

async fn list_case_steps(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<Vec<StepInstance>>, ApiError> {
    let (_, steps) = state.engine().load_case(&case_id)?;
    Ok(Json(steps))
}

async fn set_step_lock(
    State(state): State<AppState>,
    Path((case_id, step_id)): Path<(String, String)>,
    Json(payload): Json<LockPayload>,
) -> Result<Json<StepInstance>, ApiError> {
    let step = state
        .engine()
        .set_step_locked(&case_id, &step_id, payload.locked)?;
    Ok(Json(step))
}

async fn preview_replan(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(payload): Json<GoalDatePayload>,
) -> Result<Json<Vec<ReplanDiffEntry>>, ApiError> {
    let entries = state.engine().preview_replan(&case_id, payload.goal_date)?;
    Ok(Json(entries))
}

async fn apply_replan(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(payload): Json<GoalDatePayload>,
) -> Result<Json<Vec<StepInstance>>, ApiError> {
    let steps = state.engine().apply_replan(&case_id, payload.goal_date)?;
    Ok(Json(steps))
}
