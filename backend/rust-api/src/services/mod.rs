use crate::config::Config;
use crate::repository::QuizRepository;
use std::sync::Arc;

pub mod answer_service;
pub mod answer_validator;
pub mod bootstrap;
pub mod errors;
pub mod quiz_service;

pub use answer_service::AnswerService;
pub use errors::{ServiceError, ServiceResult};
pub use quiz_service::QuizService;

pub struct AppState<R: QuizRepository> {
    pub config: Config,
    pub repo: Arc<R>,
}

impl<R: QuizRepository> AppState<R> {
    pub fn new(config: Config, repo: Arc<R>) -> Self {
        Self { config, repo }
    }

    pub fn quizzes(&self) -> QuizService<R> {
        QuizService::new(self.repo.clone())
    }

    pub fn answers(&self) -> AnswerService<R> {
        AnswerService::new(self.repo.clone())
    }
}
