use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::bson_datetime_as_chrono;

/// Option picked by a visitor, captured at submission time so history
/// survives later removal of the option itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectedOption {
    pub id: i64,
    pub text: String,
}

/// Answer stored in the "user_answers" collection, one per (visitor, question)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAnswer {
    #[serde(rename = "_id")]
    pub id: i64,
    pub visitor_id: i64,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    pub question_id: i64,
    /// Owning quiz of `question_id`
    pub quiz_id: i64,
    #[serde(default)]
    pub variable_answers: Vec<SelectedOption>,
}

#[derive(Debug, Clone)]
pub struct NewUserAnswer {
    pub visitor_id: i64,
    pub question_id: i64,
    pub quiz_id: i64,
    pub answer_text: Option<String>,
    pub variable_answers: Vec<SelectedOption>,
}

/// A visitor's answer to one question
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerInput {
    /// Question id
    pub id: i64,

    #[validate(length(max = 1000, message = "Answer text must be at most 1000 characters"))]
    pub text: Option<String>,

    /// Selected option ids
    pub variable: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAnswersRequest {
    #[validate(nested)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAnswersResponse {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryAnswerResponse {
    pub id: i64,
    /// Question id
    pub question: i64,
    pub question_text: String,
    pub answer_text: Option<String>,
    pub variable_answer_ids: Vec<i64>,
    pub variable_answer_text: Vec<String>,
}

impl HistoryAnswerResponse {
    pub fn new(answer: &UserAnswer, question_text: String) -> Self {
        Self {
            id: answer.id,
            question: answer.question_id,
            question_text,
            answer_text: answer.answer_text.clone(),
            variable_answer_ids: answer.variable_answers.iter().map(|o| o.id).collect(),
            variable_answer_text: answer
                .variable_answers
                .iter()
                .map(|o| o.text.clone())
                .collect(),
        }
    }
}
