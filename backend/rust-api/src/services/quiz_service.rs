use std::collections::HashMap;
use std::sync::Arc;

use crate::metrics::{QUESTIONS_CREATED_TOTAL, QUIZZES_CREATED_TOTAL};
use crate::models::question::{
    QuestionDraft, QuestionResponse, UpdateQuestionRequest, VariableAnswerResponse,
};
use crate::models::quiz::{CreateQuizRequest, QuizResponse, UpdateQuizRequest};
use crate::models::{NewQuestion, NewQuiz, Question, QuestionKind, Quiz};
use crate::repository::QuizRepository;
use crate::utils::retry::{retry_async_when, RetryConfig};
use crate::utils::time::parse_quiz_date;

use super::errors::{ServiceError, ServiceResult};

/// Loads the quiz's live questions, their type names and options.
pub(crate) async fn render_quiz<R: QuizRepository>(
    repo: &R,
    tx: &mut R::Tx,
    quiz: &Quiz,
) -> ServiceResult<QuizResponse> {
    let questions = repo.find_active_questions(tx, quiz.id).await?;
    let mut type_names: HashMap<i64, String> = HashMap::new();
    let mut rendered = Vec::with_capacity(questions.len());

    for question in questions {
        if !type_names.contains_key(&question.type_question) {
            let name = repo
                .find_question_type(tx, question.type_question)
                .await?
                .map(|row| row.name)
                .unwrap_or_default();
            type_names.insert(question.type_question, name);
        }

        let options = repo.find_options(tx, question.id).await?;
        rendered.push(QuestionResponse {
            id: question.id,
            question: question.question,
            position: question.position,
            type_question_id: question.type_question,
            type_question_name: type_names
                .get(&question.type_question)
                .cloned()
                .unwrap_or_default(),
            variable_answer: options.iter().map(VariableAnswerResponse::from).collect(),
        });
    }

    Ok(QuizResponse::new(quiz, rendered))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Author-side operations over quizzes and their questions
pub struct QuizService<R: QuizRepository> {
    repo: Arc<R>,
}

impl<R: QuizRepository> QuizService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// The quiz, provided it exists and belongs to `author_id`.
    async fn owned_quiz(
        &self,
        tx: &mut R::Tx,
        quiz_id: i64,
        author_id: i64,
    ) -> ServiceResult<Quiz> {
        match self.repo.find_quiz(tx, quiz_id).await? {
            Some(quiz) if quiz.author_id == author_id => Ok(quiz),
            _ => Err(ServiceError::NotFound),
        }
    }

    /// Like [`Self::owned_quiz`], but archived quizzes are frozen and count as missing.
    async fn authorize_quiz(
        &self,
        tx: &mut R::Tx,
        quiz_id: i64,
        author_id: i64,
    ) -> ServiceResult<Quiz> {
        let quiz = self.owned_quiz(tx, quiz_id, author_id).await?;
        if quiz.archived {
            tracing::debug!("Quiz {} is archived, change refused", quiz_id);
            return Err(ServiceError::NotFound);
        }
        Ok(quiz)
    }

    /// The question and its quiz, provided the quiz belongs to `author_id`.
    async fn authorize_question(
        &self,
        tx: &mut R::Tx,
        question_id: i64,
        author_id: i64,
    ) -> ServiceResult<(Question, Quiz)> {
        let question = self
            .repo
            .find_question(tx, question_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let quiz = self.authorize_quiz(tx, question.quiz_id, author_id).await?;
        Ok((question, quiz))
    }

    /// Known kind whose reference row exists.
    async fn resolve_kind(
        &self,
        tx: &mut R::Tx,
        type_question: Option<i64>,
    ) -> ServiceResult<Option<QuestionKind>> {
        let Some(kind) = type_question.and_then(QuestionKind::from_id) else {
            return Ok(None);
        };
        let seeded = self.repo.find_question_type(tx, kind.id()).await?.is_some();
        Ok(seeded.then_some(kind))
    }

    pub async fn create_quiz(
        &self,
        author_id: i64,
        req: CreateQuizRequest,
    ) -> ServiceResult<QuizResponse> {
        let start = parse_quiz_date(&req.date_start).ok_or(ServiceError::InvalidDateRange)?;
        let end = parse_quiz_date(&req.date_end).ok_or(ServiceError::InvalidDateRange)?;
        if end < start {
            return Err(ServiceError::InvalidDateRange);
        }

        let mut tx = self.repo.begin().await?;
        let quiz = self
            .repo
            .insert_quiz(
                &mut tx,
                NewQuiz {
                    name: req.name,
                    description: req.description,
                    start,
                    end,
                    author_id,
                },
            )
            .await?;
        let response = render_quiz(self.repo.as_ref(), &mut tx, &quiz).await?;
        self.repo.commit(tx).await?;

        QUIZZES_CREATED_TOTAL.inc();
        tracing::info!("Quiz created: id={}, author={}", quiz.id, author_id);
        Ok(response)
    }

    pub async fn update_quiz(
        &self,
        quiz_id: i64,
        author_id: i64,
        req: UpdateQuizRequest,
    ) -> ServiceResult<QuizResponse> {
        let mut tx = self.repo.begin().await?;
        let mut quiz = self.authorize_quiz(&mut tx, quiz_id, author_id).await?;

        // Checked before any field changes
        let end = match non_empty(req.date_end) {
            Some(raw) => {
                let end = parse_quiz_date(&raw).ok_or(ServiceError::InvalidDateRange)?;
                if end < quiz.start {
                    return Err(ServiceError::InvalidDateRange);
                }
                Some(end)
            }
            None => None,
        };

        if let Some(name) = non_empty(req.name) {
            quiz.name = name;
        }
        if let Some(description) = non_empty(req.description) {
            quiz.description = description;
        }
        if let Some(end) = end {
            quiz.end = end;
        }

        self.repo.save_quiz(&mut tx, &quiz).await?;
        let response = render_quiz(self.repo.as_ref(), &mut tx, &quiz).await?;
        self.repo.commit(tx).await?;

        tracing::info!("Quiz updated: id={}", quiz.id);
        Ok(response)
    }

    /// Readable by anyone, archived quizzes included.
    pub async fn get_quiz(&self, quiz_id: i64) -> ServiceResult<QuizResponse> {
        let mut tx = self.repo.begin().await?;
        let quiz = self
            .repo
            .find_quiz(&mut tx, quiz_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        render_quiz(self.repo.as_ref(), &mut tx, &quiz).await
    }

    /// Soft-archives the quiz. Archiving twice is not an error.
    pub async fn delete_quiz(&self, quiz_id: i64, author_id: i64) -> ServiceResult<()> {
        let mut tx = self.repo.begin().await?;
        let mut quiz = self.owned_quiz(&mut tx, quiz_id, author_id).await?;
        quiz.archived = true;
        self.repo.save_quiz(&mut tx, &quiz).await?;
        self.repo.commit(tx).await?;

        tracing::info!("Quiz archived: id={}", quiz_id);
        Ok(())
    }

    /// Appends a batch of questions. Items with an unknown type, or a choice
    /// type without options, are skipped; the rest are stored in order.
    pub async fn create_questions(
        &self,
        quiz_id: i64,
        author_id: i64,
        drafts: &[QuestionDraft],
    ) -> ServiceResult<QuizResponse> {
        let (response, accepted, skipped) = retry_async_when(
            RetryConfig::transaction(),
            ServiceError::is_transient,
            || async move { self.try_create_questions(quiz_id, author_id, drafts).await },
        )
        .await?;

        QUESTIONS_CREATED_TOTAL
            .with_label_values(&["accepted"])
            .inc_by(accepted);
        QUESTIONS_CREATED_TOTAL
            .with_label_values(&["skipped"])
            .inc_by(skipped);
        if skipped > 0 {
            tracing::warn!(
                "Question batch for quiz {}: {} accepted, {} skipped",
                quiz_id,
                accepted,
                skipped
            );
        } else {
            tracing::info!("Question batch for quiz {}: {} accepted", quiz_id, accepted);
        }

        Ok(response)
    }

    async fn try_create_questions(
        &self,
        quiz_id: i64,
        author_id: i64,
        drafts: &[QuestionDraft],
    ) -> ServiceResult<(QuizResponse, u64, u64)> {
        let mut tx = self.repo.begin().await?;
        let quiz = self.authorize_quiz(&mut tx, quiz_id, author_id).await?;

        let mut position = self
            .repo
            .max_position(&mut tx, quiz.id)
            .await?
            .map_or(0, |last| last + 1);
        let (mut accepted, mut skipped) = (0_u64, 0_u64);

        for draft in drafts {
            let kind = match self.resolve_kind(&mut tx, draft.type_question).await? {
                Some(kind) if kind.accepts(&draft.variable_answer) => kind,
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            let question = self
                .repo
                .insert_question(
                    &mut tx,
                    NewQuestion {
                        quiz_id: quiz.id,
                        question: draft.text.clone(),
                        position,
                        type_question: kind.id(),
                    },
                )
                .await?;

            if kind.is_choice() {
                for text in &draft.variable_answer {
                    self.repo.insert_option(&mut tx, question.id, text).await?;
                }
            }

            position += 1;
            accepted += 1;
        }

        let response = render_quiz(self.repo.as_ref(), &mut tx, &quiz).await?;
        self.repo.commit(tx).await?;
        Ok((response, accepted, skipped))
    }

    pub async fn update_question(
        &self,
        question_id: i64,
        author_id: i64,
        req: UpdateQuestionRequest,
    ) -> ServiceResult<QuizResponse> {
        let mut tx = self.repo.begin().await?;
        let (mut question, quiz) = self
            .authorize_question(&mut tx, question_id, author_id)
            .await?;

        if let Some(text) = non_empty(req.text) {
            question.question = text;
        }

        if let Some(kind) = self.resolve_kind(&mut tx, req.type_question).await? {
            if kind.accepts(&req.variable_answer) {
                if question.is_choice() && !kind.is_choice() {
                    let removed = self.repo.delete_options(&mut tx, question.id).await?;
                    tracing::debug!(
                        "Question {} switched to free text, {} options removed",
                        question.id,
                        removed
                    );
                }
                question.type_question = kind.id();
            }
        }

        if question.is_choice() {
            for text in &req.variable_answer {
                self.repo.insert_option(&mut tx, question.id, text).await?;
            }
        }

        self.repo.save_question(&mut tx, &question).await?;
        let response = render_quiz(self.repo.as_ref(), &mut tx, &quiz).await?;
        self.repo.commit(tx).await?;

        tracing::info!("Question updated: id={}, quiz={}", question.id, quiz.id);
        Ok(response)
    }

    /// Soft-archives the question; answers given to it stay intact.
    pub async fn delete_question(
        &self,
        question_id: i64,
        author_id: i64,
    ) -> ServiceResult<QuizResponse> {
        let mut tx = self.repo.begin().await?;
        let (mut question, quiz) = self
            .authorize_question(&mut tx, question_id, author_id)
            .await?;
        question.archived = true;
        self.repo.save_question(&mut tx, &question).await?;
        let response = render_quiz(self.repo.as_ref(), &mut tx, &quiz).await?;
        self.repo.commit(tx).await?;

        tracing::info!("Question archived: id={}, quiz={}", question.id, quiz.id);
        Ok(response)
    }
}
