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
    models::question::UpdateQuestionRequest,
    models::quiz::QuizResponse,
    repository::QuizRepository,
    services::AppState,
};

/// PATCH /api/v1/questions/{id}
pub async fn update_question<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<i64>,
    AppJson(req): AppJson<UpdateQuestionRequest>,
) -> Result<Json<QuizResponse>, ApiError> {
    req.validate()?;
    let author_id = claims.user_id()?;

    let quiz = state
        .quizzes()
        .update_question(question_id, author_id, req)
        .await?;
    Ok(Json(quiz))
}

/// DELETE /api/v1/questions/{id}
pub async fn delete_question<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<i64>,
) -> Result<Json<QuizResponse>, ApiError> {
    let author_id = claims.user_id()?;
    let quiz = state
        .quizzes()
        .delete_question(question_id, author_id)
        .await?;
    Ok(Json(quiz))
}
