use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{QuizRepository, RepoResult};
use crate::models::{
    NewQuestion, NewQuiz, NewUser, NewUserAnswer, Question, QuestionKind, QuestionType, Quiz,
    User, UserAnswer, VariableAnswer,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    sequences: BTreeMap<&'static str, i64>,
    question_types: BTreeMap<i64, QuestionType>,
    users: BTreeMap<i64, User>,
    quizzes: BTreeMap<i64, Quiz>,
    questions: BTreeMap<i64, Question>,
    options: BTreeMap<i64, VariableAnswer>,
    answers: BTreeMap<i64, UserAnswer>,
}

impl Tables {
    fn next_id(&mut self, sequence: &'static str) -> i64 {
        let seq = self.sequences.entry(sequence).or_insert(0);
        *seq += 1;
        *seq
    }
}

/// Process-local storage used for development and tests.
///
/// A transaction owns the table lock for its whole lifetime, so transactions
/// are fully serialized. The first write copies the tables into a staged set
/// that replaces them on commit; a dropped handle leaves them untouched.
#[derive(Clone)]
pub struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Option<Tables>,
}

impl MemoryTx {
    fn read(&self) -> &Tables {
        self.staged.as_ref().unwrap_or(&*self.guard)
    }

    fn write(&mut self) -> &mut Tables {
        let guard = &self.guard;
        self.staged.get_or_insert_with(|| Tables::clone(guard))
    }
}

impl MemoryRepository {
    /// Empty storage with the question types already seeded.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for kind in QuestionKind::ALL {
            tables
                .question_types
                .insert(kind.id(), QuestionType::from(kind));
        }
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    /// Storage without any reference data.
    pub fn unseeded() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuizRepository for MemoryRepository {
    type Tx = MemoryTx;

    async fn begin(&self) -> RepoResult<MemoryTx> {
        let guard = self.tables.clone().lock_owned().await;
        Ok(MemoryTx {
            guard,
            staged: None,
        })
    }

    async fn commit(&self, tx: MemoryTx) -> RepoResult<()> {
        let MemoryTx { mut guard, staged } = tx;
        if let Some(staged) = staged {
            *guard = staged;
        }
        Ok(())
    }

    async fn ping(&self) -> RepoResult<()> {
        Ok(())
    }

    async fn find_question_type(
        &self,
        tx: &mut MemoryTx,
        id: i64,
    ) -> RepoResult<Option<QuestionType>> {
        Ok(tx.read().question_types.get(&id).cloned())
    }

    async fn upsert_question_type(&self, tx: &mut MemoryTx, row: QuestionType) -> RepoResult<()> {
        tx.write().question_types.entry(row.id).or_insert(row);
        Ok(())
    }

    async fn find_user_by_name(
        &self,
        tx: &mut MemoryTx,
        username: &str,
    ) -> RepoResult<Option<User>> {
        Ok(tx
            .read()
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn insert_user(&self, tx: &mut MemoryTx, user: NewUser) -> RepoResult<User> {
        let id = tx.write().next_id("users");
        let user = User {
            id,
            username: user.username,
            is_superuser: user.is_superuser,
            created_at: Utc::now(),
        };
        tx.write().users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_quiz(&self, tx: &mut MemoryTx, id: i64) -> RepoResult<Option<Quiz>> {
        Ok(tx.read().quizzes.get(&id).cloned())
    }

    async fn find_quizzes(&self, tx: &mut MemoryTx, ids: &[i64]) -> RepoResult<Vec<Quiz>> {
        let wanted: BTreeSet<i64> = ids.iter().copied().collect();
        Ok(tx
            .read()
            .quizzes
            .values()
            .filter(|quiz| wanted.contains(&quiz.id))
            .cloned()
            .collect())
    }

    async fn find_open_quizzes(
        &self,
        tx: &mut MemoryTx,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Quiz>> {
        Ok(tx
            .read()
            .quizzes
            .values()
            .filter(|quiz| quiz.is_open_at(now))
            .cloned()
            .collect())
    }

    async fn insert_quiz(&self, tx: &mut MemoryTx, quiz: NewQuiz) -> RepoResult<Quiz> {
        let id = tx.write().next_id("quizzes");
        let quiz = Quiz {
            id,
            name: quiz.name,
            description: quiz.description,
            created_at: Utc::now(),
            start: quiz.start,
            end: quiz.end,
            archived: false,
            author_id: quiz.author_id,
        };
        tx.write().quizzes.insert(id, quiz.clone());
        Ok(quiz)
    }

    async fn save_quiz(&self, tx: &mut MemoryTx, quiz: &Quiz) -> RepoResult<()> {
        tx.write().quizzes.insert(quiz.id, quiz.clone());
        Ok(())
    }

    async fn find_question(&self, tx: &mut MemoryTx, id: i64) -> RepoResult<Option<Question>> {
        Ok(tx.read().questions.get(&id).cloned())
    }

    async fn find_active_questions(
        &self,
        tx: &mut MemoryTx,
        quiz_id: i64,
    ) -> RepoResult<Vec<Question>> {
        let mut questions: Vec<Question> = tx
            .read()
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id && !q.archived)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.position);
        Ok(questions)
    }

    async fn find_questions(&self, tx: &mut MemoryTx, ids: &[i64]) -> RepoResult<Vec<Question>> {
        Ok(ids
            .iter()
            .filter_map(|id| tx.read().questions.get(id).cloned())
            .collect())
    }

    async fn max_position(&self, tx: &mut MemoryTx, quiz_id: i64) -> RepoResult<Option<i32>> {
        Ok(tx
            .read()
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .map(|q| q.position)
            .max())
    }

    async fn insert_question(
        &self,
        tx: &mut MemoryTx,
        question: NewQuestion,
    ) -> RepoResult<Question> {
        let id = tx.write().next_id("questions");
        let question = Question {
            id,
            quiz_id: question.quiz_id,
            question: question.question,
            position: question.position,
            archived: false,
            type_question: question.type_question,
        };
        tx.write().questions.insert(id, question.clone());
        Ok(question)
    }

    async fn save_question(&self, tx: &mut MemoryTx, question: &Question) -> RepoResult<()> {
        tx.write().questions.insert(question.id, question.clone());
        Ok(())
    }

    async fn find_options(
        &self,
        tx: &mut MemoryTx,
        question_id: i64,
    ) -> RepoResult<Vec<VariableAnswer>> {
        Ok(tx
            .read()
            .options
            .values()
            .filter(|o| o.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn insert_option(
        &self,
        tx: &mut MemoryTx,
        question_id: i64,
        text: &str,
    ) -> RepoResult<VariableAnswer> {
        let id = tx.write().next_id("variable_answers");
        let option = VariableAnswer {
            id,
            text: text.to_string(),
            question_id,
        };
        tx.write().options.insert(id, option.clone());
        Ok(option)
    }

    async fn delete_options(&self, tx: &mut MemoryTx, question_id: i64) -> RepoResult<u64> {
        let options = &mut tx.write().options;
        let before = options.len();
        options.retain(|_, o| o.question_id != question_id);
        Ok((before - options.len()) as u64)
    }

    async fn answered_quiz_ids(&self, tx: &mut MemoryTx, visitor_id: i64) -> RepoResult<Vec<i64>> {
        let ids: BTreeSet<i64> = tx
            .read()
            .answers
            .values()
            .filter(|a| a.visitor_id == visitor_id)
            .map(|a| a.quiz_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn has_answered(
        &self,
        tx: &mut MemoryTx,
        visitor_id: i64,
        quiz_id: i64,
    ) -> RepoResult<bool> {
        Ok(tx
            .read()
            .answers
            .values()
            .any(|a| a.visitor_id == visitor_id && a.quiz_id == quiz_id))
    }

    async fn insert_user_answer(
        &self,
        tx: &mut MemoryTx,
        answer: NewUserAnswer,
    ) -> RepoResult<UserAnswer> {
        let id = tx.write().next_id("user_answers");
        let answer = UserAnswer {
            id,
            visitor_id: answer.visitor_id,
            answer_text: answer.answer_text,
            created_at: Utc::now(),
            question_id: answer.question_id,
            quiz_id: answer.quiz_id,
            variable_answers: answer.variable_answers,
        };
        tx.write().answers.insert(id, answer.clone());
        Ok(answer)
    }

    async fn find_user_answers(
        &self,
        tx: &mut MemoryTx,
        visitor_id: i64,
        quiz_id: i64,
    ) -> RepoResult<Vec<UserAnswer>> {
        Ok(tx
            .read()
            .answers
            .values()
            .filter(|a| a.visitor_id == visitor_id && a.quiz_id == quiz_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_quiz(author_id: i64) -> NewQuiz {
        let now = Utc::now();
        NewQuiz {
            name: "Poll".to_string(),
            description: "Short poll".to_string(),
            start: now,
            end: now,
            author_id,
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let repo = MemoryRepository::new();

        let mut tx = repo.begin().await.unwrap();
        let quiz = repo.insert_quiz(&mut tx, new_quiz(1)).await.unwrap();
        drop(tx);

        let mut tx = repo.begin().await.unwrap();
        assert!(repo.find_quiz(&mut tx, quiz.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let repo = MemoryRepository::new();

        let mut tx = repo.begin().await.unwrap();
        let quiz = repo.insert_quiz(&mut tx, new_quiz(1)).await.unwrap();
        repo.commit(tx).await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        let stored = repo.find_quiz(&mut tx, quiz.id).await.unwrap();
        assert_eq!(stored, Some(quiz));
    }

    #[tokio::test]
    async fn reads_do_not_stage_a_copy() {
        let repo = MemoryRepository::new();

        let mut tx = repo.begin().await.unwrap();
        assert!(repo.find_quiz(&mut tx, 1).await.unwrap().is_none());
        assert!(repo.find_open_quizzes(&mut tx, Utc::now()).await.unwrap().is_empty());
        assert!(tx.staged.is_none());

        let quiz = repo.insert_quiz(&mut tx, new_quiz(1)).await.unwrap();
        assert!(tx.staged.is_some());
        assert_eq!(repo.find_quiz(&mut tx, quiz.id).await.unwrap(), Some(quiz.clone()));
        assert!(tx.guard.quizzes.is_empty());
        repo.commit(tx).await.unwrap();

        let tx = repo.begin().await.unwrap();
        repo.commit(tx).await.unwrap();
        let mut tx = repo.begin().await.unwrap();
        assert_eq!(repo.find_quiz(&mut tx, quiz.id).await.unwrap(), Some(quiz));
    }

    #[tokio::test]
    async fn seeds_all_question_types() {
        let repo = MemoryRepository::new();
        let mut tx = repo.begin().await.unwrap();
        for kind in QuestionKind::ALL {
            let row = repo.find_question_type(&mut tx, kind.id()).await.unwrap();
            assert_eq!(row.map(|r| r.id), Some(kind.id()));
        }
        assert!(repo.find_question_type(&mut tx, 4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn max_position_counts_archived_questions() {
        let repo = MemoryRepository::new();
        let mut tx = repo.begin().await.unwrap();
        let quiz = repo.insert_quiz(&mut tx, new_quiz(1)).await.unwrap();
        let mut question = repo
            .insert_question(
                &mut tx,
                NewQuestion {
                    quiz_id: quiz.id,
                    question: "Why?".to_string(),
                    position: 4,
                    type_question: 1,
                },
            )
            .await
            .unwrap();
        question.archived = true;
        repo.save_question(&mut tx, &question).await.unwrap();

        assert_eq!(repo.max_position(&mut tx, quiz.id).await.unwrap(), Some(4));
        assert!(repo
            .find_active_questions(&mut tx, quiz.id)
            .await
            .unwrap()
            .is_empty());
    }
}
