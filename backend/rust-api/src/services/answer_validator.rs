//! Checks a visitor's answer set against the live questions of a quiz.

use std::collections::{HashMap, HashSet};

use crate::models::answer::AnswerInput;
use crate::models::{Question, QuestionKind, VariableAnswer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerRejection {
    #[error("question {0} not found")]
    UnknownQuestion(i64),
    #[error("answer to question {0}: answer text is missing")]
    MissingText(i64),
    #[error("answer to question {0}: options are missing or contain unknown ids")]
    InvalidOptions(i64),
}

impl AnswerRejection {
    /// Short machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AnswerRejection::UnknownQuestion(_) => "404",
            AnswerRejection::MissingText(_) => "missing_text",
            AnswerRejection::InvalidOptions(_) => "invalid_options",
        }
    }

    pub fn question_id(&self) -> i64 {
        match self {
            AnswerRejection::UnknownQuestion(id)
            | AnswerRejection::MissingText(id)
            | AnswerRejection::InvalidOptions(id) => *id,
        }
    }
}

/// A non-archived question together with the ids of its own options
#[derive(Debug, Clone)]
pub struct LiveQuestion {
    pub id: i64,
    pub kind: QuestionKind,
    pub option_ids: HashSet<i64>,
}

impl LiveQuestion {
    pub fn new(id: i64, kind: QuestionKind, options: &[VariableAnswer]) -> Self {
        Self {
            id,
            kind,
            option_ids: options.iter().map(|o| o.id).collect(),
        }
    }

    /// `None` when the stored type id is not a known kind.
    pub fn from_question(question: &Question, options: &[VariableAnswer]) -> Option<Self> {
        question
            .kind()
            .map(|kind| Self::new(question.id, kind, options))
    }
}

/// Validates `answers` in submitted order against `live`.
///
/// Questions are resolved by id through a map built once from `live`; each
/// accepted answer removes its id from the working set, so answering the
/// same question twice fails as an unknown question. Returns the ids left
/// unanswered.
pub fn validate(
    answers: &[AnswerInput],
    live: &[LiveQuestion],
) -> Result<Vec<i64>, AnswerRejection> {
    let by_id: HashMap<i64, &LiveQuestion> = live.iter().map(|q| (q.id, q)).collect();
    let mut remaining: Vec<i64> = live.iter().map(|q| q.id).collect();

    for answer in answers {
        let slot = remaining
            .iter()
            .position(|id| *id == answer.id)
            .ok_or(AnswerRejection::UnknownQuestion(answer.id))?;
        let question = by_id
            .get(&answer.id)
            .ok_or(AnswerRejection::UnknownQuestion(answer.id))?;

        if question.kind.is_choice() {
            let selected = answer.variable.as_deref().unwrap_or_default();
            if selected.is_empty() || selected.iter().any(|id| !question.option_ids.contains(id)) {
                return Err(AnswerRejection::InvalidOptions(answer.id));
            }
        } else if answer.text.as_deref().is_none_or(str::is_empty) {
            return Err(AnswerRejection::MissingText(answer.id));
        }

        remaining.remove(slot);
    }

    Ok(remaining)
}
