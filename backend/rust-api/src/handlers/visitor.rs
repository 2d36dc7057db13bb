use axum::{
    extract::{Extension, Path, State},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use super::error::ApiError;
use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::answer::{SubmitAnswersRequest, SubmitAnswersResponse},
    models::quiz::{HistoryQuizResponse, QuizResponse},
    repository::QuizRepository,
    services::AppState,
};

/// GET /api/v1/visitor/quizzes
pub async fn list_active_quizzes<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<QuizResponse>>, ApiError> {
    let visitor_id = claims.user_id()?;
    let quizzes = state.answers().get_active_quizzes(visitor_id).await?;
    Ok(Json(quizzes))
}

/// POST /api/v1/visitor/quizzes/{id}/answers
pub async fn submit_answers<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<i64>,
    AppJson(req): AppJson<SubmitAnswersRequest>,
) -> Result<Json<SubmitAnswersResponse>, ApiError> {
    req.validate()?;
    let visitor_id = claims.user_id()?;

    state
        .answers()
        .submit_answers(quiz_id, visitor_id, &req.answers)
        .await?;

    Ok(Json(SubmitAnswersResponse {
        detail: "answers recorded".to_string(),
    }))
}

/// GET /api/v1/visitor/answers
pub async fn answer_history<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<HistoryQuizResponse>>, ApiError> {
    let visitor_id = claims.user_id()?;
    let history = state.answers().get_history(visitor_id).await?;
    Ok(Json(history))
}
