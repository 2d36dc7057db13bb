use super::answer_validator::AnswerRejection;
use crate::repository::RepositoryError;

/// Typed failures of the quiz, question and answer operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing id, or an id that belongs to another author
    #[error("not found")]
    NotFound,
    #[error("dates are invalid, expected DD.MM.YYYY HH:MM with the end not before the start (example: '02.12.2007 15:46')")]
    InvalidDateRange,
    #[error("invalid user token or the user is not an author")]
    Unauthorized,
    #[error("missing required parameter: {0}")]
    MissingParameter(String),
    #[error("not every question has been answered: expected {expected} answers, received {received}")]
    CountMismatch { expected: usize, received: usize },
    #[error("the quiz has already been answered or is unavailable")]
    AlreadyAnswered,
    #[error(transparent)]
    Validation(#[from] AnswerRejection),
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl ServiceError {
    /// Whether rerunning the whole unit of work may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Storage(err) if err.is_transient())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::retry::{retry_async_when, RetryConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn runs_until_given_up(err: fn() -> RepositoryError) -> usize {
        let runs = AtomicUsize::new(0);
        let result: ServiceResult<()> = retry_async_when(
            RetryConfig::transaction(),
            ServiceError::is_transient,
            || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Err(err().into())
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Storage(_))));
        runs.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn write_conflicts_rerun_the_unit_of_work() {
        let runs = runs_until_given_up(|| RepositoryError::Transient("conflict".into())).await;
        assert_eq!(runs, RetryConfig::transaction().max_attempts);
    }

    #[tokio::test]
    async fn unknown_commit_outcome_is_never_rerun() {
        let runs = runs_until_given_up(|| RepositoryError::CommitUnknown("no ack".into())).await;
        assert_eq!(runs, 1);
    }

    #[test]
    fn only_storage_conflicts_are_transient() {
        assert!(ServiceError::from(RepositoryError::Transient("x".into())).is_transient());
        assert!(!ServiceError::from(RepositoryError::CommitUnknown("x".into())).is_transient());
        assert!(!ServiceError::from(RepositoryError::Backend("x".into())).is_transient());
        assert!(!ServiceError::AlreadyAnswered.is_transient());
    }
}
