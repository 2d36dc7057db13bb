use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;

use crate::metrics::ANSWER_SETS_SUBMITTED_TOTAL;
use crate::models::answer::{AnswerInput, HistoryAnswerResponse};
use crate::models::quiz::{HistoryQuizResponse, QuizResponse};
use crate::models::{NewUserAnswer, QuestionKind, SelectedOption};
use crate::repository::{QuizRepository, RepositoryError};
use crate::utils::retry::{retry_async_when, RetryConfig};

use super::answer_validator::{self, LiveQuestion};
use super::errors::{ServiceError, ServiceResult};
use super::quiz_service::render_quiz;

/// Visitor-side operations: listing open quizzes, answering, history
pub struct AnswerService<R: QuizRepository> {
    repo: Arc<R>,
}

impl<R: QuizRepository> AnswerService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Open, non-archived quizzes with at least one live question that the
    /// visitor has not answered yet.
    pub async fn get_active_quizzes(&self, visitor_id: i64) -> ServiceResult<Vec<QuizResponse>> {
        let mut tx = self.repo.begin().await?;
        let answered: BTreeSet<i64> = self
            .repo
            .answered_quiz_ids(&mut tx, visitor_id)
            .await?
            .into_iter()
            .collect();

        let quizzes = self.repo.find_open_quizzes(&mut tx, Utc::now()).await?;
        let mut result = Vec::new();
        for quiz in quizzes.iter().filter(|q| !answered.contains(&q.id)) {
            let rendered = render_quiz(self.repo.as_ref(), &mut tx, quiz).await?;
            // Nothing to answer yet
            if !rendered.questions.is_empty() {
                result.push(rendered);
            }
        }

        tracing::debug!(
            "Visitor {} has {} quizzes available",
            visitor_id,
            result.len()
        );
        Ok(result)
    }

    /// Records the full answer set for a quiz, once per visitor.
    pub async fn submit_answers(
        &self,
        quiz_id: i64,
        visitor_id: i64,
        answers: &[AnswerInput],
    ) -> ServiceResult<()> {
        tracing::info!(
            "Processing answer submission: quiz={}, visitor={}, answers={}",
            quiz_id,
            visitor_id,
            answers.len()
        );

        let result = retry_async_when(
            RetryConfig::transaction(),
            ServiceError::is_transient,
            || async move { self.try_submit_answers(quiz_id, visitor_id, answers).await },
        )
        .await;

        let label = match &result {
            Ok(()) => "accepted",
            Err(ServiceError::AlreadyAnswered) => "already_answered",
            Err(ServiceError::CountMismatch { .. }) => "count_mismatch",
            Err(ServiceError::Validation(_)) => "invalid",
            Err(_) => "error",
        };
        ANSWER_SETS_SUBMITTED_TOTAL
            .with_label_values(&[label])
            .inc();

        match &result {
            Ok(()) => tracing::info!("Answers recorded: quiz={}, visitor={}", quiz_id, visitor_id),
            Err(e) => tracing::warn!(
                "Answer submission rejected: quiz={}, visitor={}, reason={}",
                quiz_id,
                visitor_id,
                e
            ),
        }
        result
    }

    async fn try_submit_answers(
        &self,
        quiz_id: i64,
        visitor_id: i64,
        answers: &[AnswerInput],
    ) -> ServiceResult<()> {
        let mut tx = self.repo.begin().await?;

        let quiz = self.repo.find_quiz(&mut tx, quiz_id).await?;
        if quiz.is_none() || self.repo.has_answered(&mut tx, visitor_id, quiz_id).await? {
            return Err(ServiceError::AlreadyAnswered);
        }

        // Unavailable until it has live questions
        let questions = self.repo.find_active_questions(&mut tx, quiz_id).await?;
        if questions.is_empty() {
            return Err(ServiceError::AlreadyAnswered);
        }
        if answers.len() != questions.len() {
            return Err(ServiceError::CountMismatch {
                expected: questions.len(),
                received: answers.len(),
            });
        }

        let mut live = Vec::with_capacity(questions.len());
        let mut option_texts: HashMap<i64, String> = HashMap::new();
        for question in &questions {
            let options = self.repo.find_options(&mut tx, question.id).await?;
            let entry = LiveQuestion::from_question(question, &options).ok_or_else(|| {
                RepositoryError::Backend(format!(
                    "question {} has unknown type {}",
                    question.id, question.type_question
                ))
            })?;
            option_texts.extend(options.into_iter().map(|o| (o.id, o.text)));
            live.push(entry);
        }

        answer_validator::validate(answers, &live)?;

        let kinds: HashMap<i64, QuestionKind> = live.iter().map(|q| (q.id, q.kind)).collect();
        for answer in answers {
            let kind = kinds
                .get(&answer.id)
                .copied()
                .ok_or(ServiceError::Validation(
                    answer_validator::AnswerRejection::UnknownQuestion(answer.id),
                ))?;

            let selected = answer.variable.as_deref().unwrap_or_default();
            let (answer_text, picked): (Option<String>, Vec<i64>) = match kind {
                QuestionKind::FreeText => (answer.text.clone(), Vec::new()),
                QuestionKind::SingleChoice => (None, selected.iter().take(1).copied().collect()),
                QuestionKind::MultiChoice => {
                    let unique: BTreeSet<i64> = selected.iter().copied().collect();
                    (None, unique.into_iter().collect())
                }
            };

            let variable_answers = picked
                .into_iter()
                .map(|id| SelectedOption {
                    id,
                    text: option_texts.get(&id).cloned().unwrap_or_default(),
                })
                .collect();

            self.repo
                .insert_user_answer(
                    &mut tx,
                    NewUserAnswer {
                        visitor_id,
                        question_id: answer.id,
                        quiz_id,
                        answer_text,
                        variable_answers,
                    },
                )
                .await?;
        }

        self.repo.commit(tx).await?;
        Ok(())
    }

    /// Every quiz the visitor answered, with those answers instead of the
    /// question list.
    pub async fn get_history(&self, visitor_id: i64) -> ServiceResult<Vec<HistoryQuizResponse>> {
        let mut tx = self.repo.begin().await?;
        let quiz_ids = self.repo.answered_quiz_ids(&mut tx, visitor_id).await?;
        let quizzes = self.repo.find_quizzes(&mut tx, &quiz_ids).await?;

        let mut history = Vec::with_capacity(quizzes.len());
        for quiz in &quizzes {
            let answers = self
                .repo
                .find_user_answers(&mut tx, visitor_id, quiz.id)
                .await?;
            let question_ids: Vec<i64> = answers.iter().map(|a| a.question_id).collect();
            let texts: HashMap<i64, String> = self
                .repo
                .find_questions(&mut tx, &question_ids)
                .await?
                .into_iter()
                .map(|q| (q.id, q.question))
                .collect();

            let rendered = answers
                .iter()
                .map(|answer| {
                    let text = texts.get(&answer.question_id).cloned().unwrap_or_default();
                    HistoryAnswerResponse::new(answer, text)
                })
                .collect();
            history.push(HistoryQuizResponse::new(quiz, rendered));
        }

        Ok(history)
    }
}
