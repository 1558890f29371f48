use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use crate::accessibility::PreferenceCommand;
use crate::app::{App, DEFAULT_DUE_LIMIT};
use crate::models::{LessonCompletion, QuizSubmission, Recall};
use crate::srs::DueOrder;

#[derive(Clone)]
pub struct ApiState {
    pub app: Arc<App>,
}

pub fn app_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/learners/:learner_id/profile", get(get_profile))
        .route("/api/learners/:learner_id/reviews", post(submit_review))
        .route("/api/learners/:learner_id/reviews/due", get(get_due_items))
        .route("/api/learners/:learner_id/reviews/stats", get(get_review_stats))
        .route("/api/learners/:learner_id/reviews/:item_id", get(get_review_state))
        .route("/api/learners/:learner_id/enrollments", post(enroll_items))
        .route(
            "/api/learners/:learner_id/preferences",
            get(get_preferences).post(apply_preference),
        )
        .route("/api/learners/:learner_id/lessons/:lesson_id/complete", post(complete_lesson))
        .route(
            "/api/learners/:learner_id/quiz-attempts",
            get(get_quiz_attempts).post(submit_quiz),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Storage and service failures surface as 500 with the error text.
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::error!("Request failed: {:#}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", self.0)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn health() -> &'static str {
    "ok"
}

async fn get_profile(
    State(state): State<ApiState>,
    Path(learner_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let summary = state.app.profile(&learner_id).await?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
struct ReviewRequest {
    item_id: String,
    recalled: bool,
}

async fn submit_review(
    State(state): State<ApiState>,
    Path(learner_id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<impl IntoResponse> {
    let recall = Recall::from_recalled(payload.recalled);
    let next = state.app.review(&learner_id, &payload.item_id, recall).await?;
    Ok(Json(next))
}

async fn get_review_state(
    State(state): State<ApiState>,
    Path((learner_id, item_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    match state.app.review_state(&learner_id, &item_id).await? {
        Some(review) => Ok(Json(review).into_response()),
        None => Ok((StatusCode::NOT_FOUND, "no review state for this item").into_response()),
    }
}

#[derive(Deserialize)]
struct DueQuery {
    #[serde(default)]
    order: DueOrder,
    limit: Option<usize>,
}

async fn get_due_items(
    State(state): State<ApiState>,
    Path(learner_id): Path<String>,
    Query(query): Query<DueQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_DUE_LIMIT);
    let due = state.app.due_items(&learner_id, query.order, limit).await?;
    Ok(Json(due))
}

async fn get_review_stats(
    State(state): State<ApiState>,
    Path(learner_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let stats = state.app.review_stats(&learner_id).await?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
struct EnrollRequest {
    item_ids: Vec<String>,
}

#[derive(Serialize)]
struct EnrollResponse {
    enrolled: u64,
}

async fn enroll_items(
    State(state): State<ApiState>,
    Path(learner_id): Path<String>,
    Json(payload): Json<EnrollRequest>,
) -> ApiResult<impl IntoResponse> {
    let enrolled = state.app.enroll(&learner_id, &payload.item_ids).await?;
    Ok(Json(EnrollResponse { enrolled }))
}

async fn get_preferences(
    State(state): State<ApiState>,
    Path(learner_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let preferences = state.app.preferences(&learner_id).await?;
    Ok(Json(preferences))
}

async fn apply_preference(
    State(state): State<ApiState>,
    Path(learner_id): Path<String>,
    Json(command): Json<PreferenceCommand>,
) -> ApiResult<impl IntoResponse> {
    let preferences = state.app.apply_preference(&learner_id, command).await?;
    Ok(Json(preferences))
}

async fn complete_lesson(
    State(state): State<ApiState>,
    Path((learner_id, lesson_id)): Path<(String, String)>,
    Json(payload): Json<LessonCompletion>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.app.complete_lesson(&learner_id, &lesson_id, &payload).await?;
    Ok(Json(outcome))
}

async fn submit_quiz(
    State(state): State<ApiState>,
    Path(learner_id): Path<String>,
    Json(payload): Json<QuizSubmission>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.app.submit_quiz(&learner_id, &payload).await?;
    Ok(Json(outcome))
}

async fn get_quiz_attempts(
    State(state): State<ApiState>,
    Path(learner_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let attempts = state.app.quiz_attempts(&learner_id).await?;
    Ok(Json(attempts))
}
