use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use super::error::ApiError;
use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::question::CreateQuestionsRequest,
    models::quiz::{CreateQuizRequest, QuizResponse, UpdateQuizRequest},
    repository::QuizRepository,
    services::AppState,
};

/// GET /api/v1/quizzes/{id}
pub async fn get_quiz<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(quiz_id): Path<i64>,
) -> Result<Json<QuizResponse>, ApiError> {
    let quiz = state.quizzes().get_quiz(quiz_id).await?;
    Ok(Json(quiz))
}

/// POST /api/v1/quizzes
pub async fn create_quiz<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateQuizRequest>,
) -> Result<(StatusCode, Json<QuizResponse>), ApiError> {
    req.validate()?;
    let author_id = claims.user_id()?;

    let quiz = state.quizzes().create_quiz(author_id, req).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// PATCH /api/v1/quizzes/{id}
pub async fn update_quiz<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<i64>,
    AppJson(req): AppJson<UpdateQuizRequest>,
) -> Result<Json<QuizResponse>, ApiError> {
    req.validate()?;
    let author_id = claims.user_id()?;

    let quiz = state.quizzes().update_quiz(quiz_id, author_id, req).await?;
    Ok(Json(quiz))
}

/// DELETE /api/v1/quizzes/{id}
pub async fn delete_quiz<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let author_id = claims.user_id()?;
    state.quizzes().delete_quiz(quiz_id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/quizzes/{id}/questions
pub async fn create_questions<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<i64>,
    AppJson(req): AppJson<CreateQuestionsRequest>,
) -> Result<(StatusCode, Json<QuizResponse>), ApiError> {
    req.validate()?;
    let author_id = claims.user_id()?;

    let quiz = state
        .quizzes()
        .create_questions(quiz_id, author_id, &req.questions)
        .await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}
