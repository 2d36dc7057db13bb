use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use validator::ValidationErrors;

use crate::services::answer_validator::AnswerRejection;
use crate::services::ServiceError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Answer set refused by the validator
    Rejected(AnswerRejection),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound => ApiError::NotFound(err.to_string()),
            ServiceError::Unauthorized => ApiError::Unauthorized(err.to_string()),
            ServiceError::Validation(rejection) => ApiError::Rejected(rejection),
            ServiceError::InvalidDateRange
            | ServiceError::MissingParameter(_)
            | ServiceError::CountMismatch { .. }
            | ServiceError::AlreadyAnswered => ApiError::BadRequest(err.to_string()),
            ServiceError::Storage(e) => {
                tracing::error!("Storage failure: {}", e);
                ApiError::Internal("internal server error".to_string())
            }
        }
    }
}

/// Field-level failures from `validator` surface as a missing parameter.
impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .errors()
            .keys()
            .map(|field| field.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!("Request validation failed: {}", errors);
        ServiceError::MissingParameter(fields).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::Rejected(rejection) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": rejection.to_string(),
                    "code": rejection.code(),
                    "question": rejection.question_id(),
                }),
            ),
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": message }))
            }
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, json!({ "error": message })),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
