use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::answer::HistoryAnswerResponse;
use super::question::QuestionResponse;
use super::user::bson_datetime_as_chrono;
use crate::utils::time::format_quiz_date;

/// Quiz stored in the "quizzes" collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub start: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub end: DateTime<Utc>,
    /// Soft-delete marker; archived quizzes are never removed
    #[serde(default)]
    pub archived: bool,
    pub author_id: i64,
}

impl Quiz {
    pub fn status(&self) -> QuizStatus {
        if self.archived {
            QuizStatus::Archived
        } else {
            QuizStatus::Active
        }
    }

    /// Whether visitors may answer the quiz at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        !self.archived && self.start <= now && now <= self.end
    }
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub name: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub author_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Active,
    Archived,
}

/// Request для создания опроса
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    #[validate(length(
        min = 1,
        max = 1000,
        message = "Description must be between 1 and 1000 characters"
    ))]
    pub description: String,

    /// `DD.MM.YYYY HH:MM`
    #[validate(length(min = 1, message = "date_start is required"))]
    pub date_start: String,

    #[validate(length(min = 1, message = "date_end is required"))]
    pub date_end: String,
}

/// Partial update: absent or empty fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub date_end: Option<String>,
}

/// Quiz as returned to clients, with its live questions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub status: QuizStatus,
    pub questions: Vec<QuestionResponse>,
}

impl QuizResponse {
    pub fn new(quiz: &Quiz, questions: Vec<QuestionResponse>) -> Self {
        Self {
            id: quiz.id,
            name: quiz.name.clone(),
            description: quiz.description.clone(),
            start: format_quiz_date(&quiz.start),
            end: format_quiz_date(&quiz.end),
            status: quiz.status(),
            questions,
        }
    }
}

/// History entry: the quiz without its question list, plus the caller's answers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryQuizResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub status: QuizStatus,
    pub answers: Vec<HistoryAnswerResponse>,
}

impl HistoryQuizResponse {
    pub fn new(quiz: &Quiz, answers: Vec<HistoryAnswerResponse>) -> Self {
        Self {
            id: quiz.id,
            name: quiz.name.clone(),
            description: quiz.description.clone(),
            start: format_quiz_date(&quiz.start),
            end: format_quiz_date(&quiz.end),
            status: quiz.status(),
            answers,
        }
    }
}
