use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// The three kinds of question a quiz can hold. The numeric ids are part of
/// the public API and match the seeded "type_questions" reference rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    FreeText,
    SingleChoice,
    MultiChoice,
}

impl QuestionKind {
    pub const ALL: [QuestionKind; 3] = [
        QuestionKind::FreeText,
        QuestionKind::SingleChoice,
        QuestionKind::MultiChoice,
    ];

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(QuestionKind::FreeText),
            2 => Some(QuestionKind::SingleChoice),
            3 => Some(QuestionKind::MultiChoice),
            _ => None,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            QuestionKind::FreeText => 1,
            QuestionKind::SingleChoice => 2,
            QuestionKind::MultiChoice => 3,
        }
    }

    pub fn default_name(&self) -> &'static str {
        match self {
            QuestionKind::FreeText => "Free text",
            QuestionKind::SingleChoice => "Single choice",
            QuestionKind::MultiChoice => "Multiple choice",
        }
    }

    pub fn is_choice(&self) -> bool {
        !matches!(self, QuestionKind::FreeText)
    }

    /// A kind may be assigned when it is free text, or when it is a choice
    /// kind and options are supplied together with it.
    pub fn accepts(&self, options: &[String]) -> bool {
        !self.is_choice() || !options.is_empty()
    }
}

/// Reference row in "type_questions"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionType {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
}

impl From<QuestionKind> for QuestionType {
    fn from(kind: QuestionKind) -> Self {
        QuestionType {
            id: kind.id(),
            name: kind.default_name().to_string(),
        }
    }
}

/// Question stored in the "questions" collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: i64,
    pub quiz_id: i64,
    pub question: String,
    /// Ordering key, unique within the quiz
    pub position: i32,
    #[serde(default)]
    pub archived: bool,
    pub type_question: i64,
}

impl Question {
    pub fn kind(&self) -> Option<QuestionKind> {
        QuestionKind::from_id(self.type_question)
    }

    pub fn is_choice(&self) -> bool {
        self.kind().is_some_and(|kind| kind.is_choice())
    }
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub quiz_id: i64,
    pub question: String,
    pub position: i32,
    pub type_question: i64,
}

/// Selectable option of a choice question ("variable_answers")
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableAnswer {
    #[serde(rename = "_id")]
    pub id: i64,
    pub text: String,
    pub question_id: i64,
}

fn validate_option_texts(options: &[String]) -> Result<(), ValidationError> {
    if options.iter().any(|text| text.is_empty() || text.chars().count() > 200) {
        let mut err = ValidationError::new("variable_answer");
        err.message = Some("Each option must be between 1 and 200 characters".into());
        return Err(err);
    }
    Ok(())
}

/// One item of a question batch
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionDraft {
    #[validate(length(
        min = 1,
        max = 4000,
        message = "Question text must be between 1 and 4000 characters"
    ))]
    pub text: String,

    /// 1 - free text, 2 - single choice, 3 - multiple choice
    pub type_question: Option<i64>,

    #[serde(default)]
    #[validate(custom(function = "validate_option_texts"))]
    pub variable_answer: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionsRequest {
    #[validate(length(min = 1, message = "questions must not be empty"), nested)]
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(max = 4000, message = "Question text must be at most 4000 characters"))]
    pub text: Option<String>,

    pub type_question: Option<i64>,

    /// Appended to the existing options; never replaces them
    #[serde(default)]
    #[validate(custom(function = "validate_option_texts"))]
    pub variable_answer: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableAnswerResponse {
    pub id: i64,
    pub text: String,
}

impl From<&VariableAnswer> for VariableAnswerResponse {
    fn from(option: &VariableAnswer) -> Self {
        VariableAnswerResponse {
            id: option.id,
            text: option.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionResponse {
    pub id: i64,
    pub question: String,
    pub position: i32,
    pub type_question_id: i64,
    pub type_question_name: String,
    pub variable_answer: Vec<VariableAnswerResponse>,
}
