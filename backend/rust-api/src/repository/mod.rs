//! Storage access for quizzes, questions, options, answers and users.
//!
//! Every operation runs against an explicit transaction handle obtained from
//! [`QuizRepository::begin`]. Writes become visible only after
//! [`QuizRepository::commit`]; dropping the handle discards them. Both the
//! duplicate-submission check and the next-position read happen on the same
//! handle as the writes that depend on them.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    NewQuestion, NewQuiz, NewUser, NewUserAnswer, Question, QuestionType, Quiz, User, UserAnswer,
    VariableAnswer,
};

pub use memory::MemoryRepository;
pub use mongo::MongoRepository;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Conflict with a concurrent transaction; the whole unit of work may be rerun.
    #[error("transient storage conflict: {0}")]
    Transient(String),
    /// The commit may or may not have been applied; rerunning the unit of
    /// work could apply it twice.
    #[error("transaction commit outcome unknown: {0}")]
    CommitUnknown(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Transient(_))
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait QuizRepository: Send + Sync + 'static {
    type Tx: Send;

    async fn begin(&self) -> RepoResult<Self::Tx>;
    async fn commit(&self, tx: Self::Tx) -> RepoResult<()>;
    async fn ping(&self) -> RepoResult<()>;

    // Reference data
    async fn find_question_type(&self, tx: &mut Self::Tx, id: i64)
        -> RepoResult<Option<QuestionType>>;
    async fn upsert_question_type(&self, tx: &mut Self::Tx, row: QuestionType) -> RepoResult<()>;

    // Users
    async fn find_user_by_name(&self, tx: &mut Self::Tx, username: &str)
        -> RepoResult<Option<User>>;
    async fn insert_user(&self, tx: &mut Self::Tx, user: NewUser) -> RepoResult<User>;

    // Quizzes
    async fn find_quiz(&self, tx: &mut Self::Tx, id: i64) -> RepoResult<Option<Quiz>>;
    async fn find_quizzes(&self, tx: &mut Self::Tx, ids: &[i64]) -> RepoResult<Vec<Quiz>>;
    /// Non-archived quizzes whose window contains `now`.
    async fn find_open_quizzes(&self, tx: &mut Self::Tx, now: DateTime<Utc>)
        -> RepoResult<Vec<Quiz>>;
    async fn insert_quiz(&self, tx: &mut Self::Tx, quiz: NewQuiz) -> RepoResult<Quiz>;
    async fn save_quiz(&self, tx: &mut Self::Tx, quiz: &Quiz) -> RepoResult<()>;

    // Questions
    async fn find_question(&self, tx: &mut Self::Tx, id: i64) -> RepoResult<Option<Question>>;
    /// Non-archived questions of the quiz ordered by position.
    async fn find_active_questions(&self, tx: &mut Self::Tx, quiz_id: i64)
        -> RepoResult<Vec<Question>>;
    async fn find_questions(&self, tx: &mut Self::Tx, ids: &[i64]) -> RepoResult<Vec<Question>>;
    /// Highest position in the quiz, archived questions included.
    async fn max_position(&self, tx: &mut Self::Tx, quiz_id: i64) -> RepoResult<Option<i32>>;
    async fn insert_question(&self, tx: &mut Self::Tx, question: NewQuestion)
        -> RepoResult<Question>;
    async fn save_question(&self, tx: &mut Self::Tx, question: &Question) -> RepoResult<()>;

    // Options
    async fn find_options(&self, tx: &mut Self::Tx, question_id: i64)
        -> RepoResult<Vec<VariableAnswer>>;
    async fn insert_option(&self, tx: &mut Self::Tx, question_id: i64, text: &str)
        -> RepoResult<VariableAnswer>;
    async fn delete_options(&self, tx: &mut Self::Tx, question_id: i64) -> RepoResult<u64>;

    // Answers
    /// Quizzes with at least one answer by the visitor, regardless of the
    /// archived state of the answered questions.
    async fn answered_quiz_ids(&self, tx: &mut Self::Tx, visitor_id: i64)
        -> RepoResult<Vec<i64>>;
    async fn has_answered(&self, tx: &mut Self::Tx, visitor_id: i64, quiz_id: i64)
        -> RepoResult<bool>;
    async fn insert_user_answer(&self, tx: &mut Self::Tx, answer: NewUserAnswer)
        -> RepoResult<UserAnswer>;
    async fn find_user_answers(&self, tx: &mut Self::Tx, visitor_id: i64, quiz_id: i64)
        -> RepoResult<Vec<UserAnswer>>;
}
