use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    error::{Error as MongoError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{IndexOptions, ReturnDocument},
    Client, ClientSession, Collection, Database, IndexModel,
};
use serde::Deserialize;
use std::time::Duration;

use super::{QuizRepository, RepoResult, RepositoryError};
use crate::models::{
    NewQuestion, NewQuiz, NewUser, NewUserAnswer, Question, QuestionType, Quiz, User, UserAnswer,
    VariableAnswer,
};
use crate::utils::time::chrono_to_bson;

const QUIZZES: &str = "quizzes";
const QUESTIONS: &str = "questions";
const VARIABLE_ANSWERS: &str = "variable_answers";
const USER_ANSWERS: &str = "user_answers";
const TYPE_QUESTIONS: &str = "type_questions";
const USERS: &str = "users";
const COUNTERS: &str = "counters";

const COMMIT_ATTEMPTS: usize = 3;

impl From<MongoError> for RepositoryError {
    fn from(err: MongoError) -> Self {
        if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
            RepositoryError::Transient(err.to_string())
        } else if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) {
            RepositoryError::CommitUnknown(err.to_string())
        } else {
            RepositoryError::Backend(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct Counter {
    seq: i64,
}

/// MongoDB-backed storage. Every transaction is a `ClientSession` with a
/// started multi-document transaction, so the server must run as a replica set.
#[derive(Clone)]
pub struct MongoRepository {
    client: Client,
    db: Database,
}

impl MongoRepository {
    pub fn new(client: Client, database: &str) -> Self {
        let db = client.database(database);
        Self { client, db }
    }

    /// Creates the indexes the queries below rely on. Safe to call on every start.
    pub async fn ensure_indexes(&self) -> RepoResult<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.db
            .collection::<Document>(QUESTIONS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "quiz_id": 1, "position": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;

        self.db
            .collection::<Document>(VARIABLE_ANSWERS)
            .create_index(IndexModel::builder().keys(doc! { "question_id": 1 }).build())
            .await?;

        self.db
            .collection::<Document>(USER_ANSWERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "visitor_id": 1, "quiz_id": 1 })
                    .build(),
            )
            .await?;

        self.db
            .collection::<Document>(USERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    fn quizzes(&self) -> Collection<Quiz> {
        self.db.collection(QUIZZES)
    }

    fn questions(&self) -> Collection<Question> {
        self.db.collection(QUESTIONS)
    }

    fn options(&self) -> Collection<VariableAnswer> {
        self.db.collection(VARIABLE_ANSWERS)
    }

    fn user_answers(&self) -> Collection<UserAnswer> {
        self.db.collection(USER_ANSWERS)
    }

    fn question_types(&self) -> Collection<QuestionType> {
        self.db.collection(TYPE_QUESTIONS)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    /// Next value of an integer id sequence stored in "counters".
    async fn next_id(&self, tx: &mut ClientSession, sequence: &str) -> RepoResult<i64> {
        let counter = self
            .db
            .collection::<Counter>(COUNTERS)
            .find_one_and_update(doc! { "_id": sequence }, doc! { "$inc": { "seq": 1_i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .session(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::Backend(format!("counter {} missing", sequence)))?;
        Ok(counter.seq)
    }

    async fn collect<T>(
        &self,
        collection: Collection<T>,
        tx: &mut ClientSession,
        filter: Document,
        sort: Option<Document>,
    ) -> RepoResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned + Send + Sync + Unpin,
    {
        let mut cursor = collection
            .find(filter)
            .sort(sort.unwrap_or_else(|| doc! { "_id": 1 }))
            .session(&mut *tx)
            .await?;
        let items: Vec<T> = cursor.stream(&mut *tx).try_collect().await?;
        Ok(items)
    }
}

#[async_trait]
impl QuizRepository for MongoRepository {
    type Tx = ClientSession;

    async fn begin(&self) -> RepoResult<ClientSession> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        Ok(session)
    }

    /// Only the commit itself is repeated when its outcome is unknown; the
    /// server treats a repeated commit of the same transaction as a no-op.
    async fn commit(&self, mut tx: ClientSession) -> RepoResult<()> {
        let mut attempt = 1;
        loop {
            match tx.commit_transaction().await {
                Ok(()) => return Ok(()),
                Err(err)
                    if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                        && attempt < COMMIT_ATTEMPTS =>
                {
                    tracing::warn!(
                        "Commit outcome unknown (attempt {}), retrying commit: {}",
                        attempt,
                        err
                    );
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(20 * attempt as u64)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn ping(&self) -> RepoResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find_question_type(
        &self,
        tx: &mut ClientSession,
        id: i64,
    ) -> RepoResult<Option<QuestionType>> {
        Ok(self
            .question_types()
            .find_one(doc! { "_id": id })
            .session(&mut *tx)
            .await?)
    }

    async fn upsert_question_type(
        &self,
        tx: &mut ClientSession,
        row: QuestionType,
    ) -> RepoResult<()> {
        self.question_types()
            .update_one(
                doc! { "_id": row.id },
                doc! { "$setOnInsert": { "name": row.name } },
            )
            .upsert(true)
            .session(&mut *tx)
            .await?;
        Ok(())
    }

    async fn find_user_by_name(
        &self,
        tx: &mut ClientSession,
        username: &str,
    ) -> RepoResult<Option<User>> {
        Ok(self
            .users()
            .find_one(doc! { "username": username })
            .session(&mut *tx)
            .await?)
    }

    async fn insert_user(&self, tx: &mut ClientSession, user: NewUser) -> RepoResult<User> {
        let user = User {
            id: self.next_id(tx, USERS).await?,
            username: user.username,
            is_superuser: user.is_superuser,
            created_at: Utc::now(),
        };
        self.users().insert_one(&user).session(&mut *tx).await?;
        Ok(user)
    }

    async fn find_quiz(&self, tx: &mut ClientSession, id: i64) -> RepoResult<Option<Quiz>> {
        Ok(self
            .quizzes()
            .find_one(doc! { "_id": id })
            .session(&mut *tx)
            .await?)
    }

    async fn find_quizzes(&self, tx: &mut ClientSession, ids: &[i64]) -> RepoResult<Vec<Quiz>> {
        self.collect(self.quizzes(), tx, doc! { "_id": { "$in": ids } }, None)
            .await
    }

    async fn find_open_quizzes(
        &self,
        tx: &mut ClientSession,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Quiz>> {
        let now = chrono_to_bson(now);
        let filter = doc! {
            "start": { "$lte": now },
            "end": { "$gte": now },
            "archived": { "$ne": true },
        };
        self.collect(self.quizzes(), tx, filter, None).await
    }

    async fn insert_quiz(&self, tx: &mut ClientSession, quiz: NewQuiz) -> RepoResult<Quiz> {
        let quiz = Quiz {
            id: self.next_id(tx, QUIZZES).await?,
            name: quiz.name,
            description: quiz.description,
            created_at: Utc::now(),
            start: quiz.start,
            end: quiz.end,
            archived: false,
            author_id: quiz.author_id,
        };
        self.quizzes().insert_one(&quiz).session(&mut *tx).await?;
        Ok(quiz)
    }

    async fn save_quiz(&self, tx: &mut ClientSession, quiz: &Quiz) -> RepoResult<()> {
        self.quizzes()
            .replace_one(doc! { "_id": quiz.id }, quiz)
            .session(&mut *tx)
            .await?;
        Ok(())
    }

    async fn find_question(
        &self,
        tx: &mut ClientSession,
        id: i64,
    ) -> RepoResult<Option<Question>> {
        Ok(self
            .questions()
            .find_one(doc! { "_id": id })
            .session(&mut *tx)
            .await?)
    }

    async fn find_active_questions(
        &self,
        tx: &mut ClientSession,
        quiz_id: i64,
    ) -> RepoResult<Vec<Question>> {
        self.collect(
            self.questions(),
            tx,
            doc! { "quiz_id": quiz_id, "archived": { "$ne": true } },
            Some(doc! { "position": 1 }),
        )
        .await
    }

    async fn find_questions(
        &self,
        tx: &mut ClientSession,
        ids: &[i64],
    ) -> RepoResult<Vec<Question>> {
        self.collect(self.questions(), tx, doc! { "_id": { "$in": ids } }, None)
            .await
    }

    async fn max_position(&self, tx: &mut ClientSession, quiz_id: i64) -> RepoResult<Option<i32>> {
        let last = self
            .questions()
            .find_one(doc! { "quiz_id": quiz_id })
            .sort(doc! { "position": -1 })
            .session(&mut *tx)
            .await?;
        Ok(last.map(|q| q.position))
    }

    async fn insert_question(
        &self,
        tx: &mut ClientSession,
        question: NewQuestion,
    ) -> RepoResult<Question> {
        let question = Question {
            id: self.next_id(tx, QUESTIONS).await?,
            quiz_id: question.quiz_id,
            question: question.question,
            position: question.position,
            archived: false,
            type_question: question.type_question,
        };
        self.questions()
            .insert_one(&question)
            .session(&mut *tx)
            .await?;
        Ok(question)
    }

    async fn save_question(&self, tx: &mut ClientSession, question: &Question) -> RepoResult<()> {
        self.questions()
            .replace_one(doc! { "_id": question.id }, question)
            .session(&mut *tx)
            .await?;
        Ok(())
    }

    async fn find_options(
        &self,
        tx: &mut ClientSession,
        question_id: i64,
    ) -> RepoResult<Vec<VariableAnswer>> {
        self.collect(
            self.options(),
            tx,
            doc! { "question_id": question_id },
            None,
        )
        .await
    }

    async fn insert_option(
        &self,
        tx: &mut ClientSession,
        question_id: i64,
        text: &str,
    ) -> RepoResult<VariableAnswer> {
        let option = VariableAnswer {
            id: self.next_id(tx, VARIABLE_ANSWERS).await?,
            text: text.to_string(),
            question_id,
        };
        self.options().insert_one(&option).session(&mut *tx).await?;
        Ok(option)
    }

    async fn delete_options(&self, tx: &mut ClientSession, question_id: i64) -> RepoResult<u64> {
        let result = self
            .options()
            .delete_many(doc! { "question_id": question_id })
            .session(&mut *tx)
            .await?;
        Ok(result.deleted_count)
    }

    async fn answered_quiz_ids(
        &self,
        tx: &mut ClientSession,
        visitor_id: i64,
    ) -> RepoResult<Vec<i64>> {
        let values = self
            .user_answers()
            .distinct("quiz_id", doc! { "visitor_id": visitor_id })
            .session(&mut *tx)
            .await?;
        let mut ids: Vec<i64> = values
            .into_iter()
            .filter_map(|value| match value {
                Bson::Int64(id) => Some(id),
                Bson::Int32(id) => Some(i64::from(id)),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn has_answered(
        &self,
        tx: &mut ClientSession,
        visitor_id: i64,
        quiz_id: i64,
    ) -> RepoResult<bool> {
        let existing = self
            .user_answers()
            .find_one(doc! { "visitor_id": visitor_id, "quiz_id": quiz_id })
            .session(&mut *tx)
            .await?;
        Ok(existing.is_some())
    }

    async fn insert_user_answer(
        &self,
        tx: &mut ClientSession,
        answer: NewUserAnswer,
    ) -> RepoResult<UserAnswer> {
        let answer = UserAnswer {
            id: self.next_id(tx, USER_ANSWERS).await?,
            visitor_id: answer.visitor_id,
            answer_text: answer.answer_text,
            created_at: Utc::now(),
            question_id: answer.question_id,
            quiz_id: answer.quiz_id,
            variable_answers: answer.variable_answers,
        };
        self.user_answers()
            .insert_one(&answer)
            .session(&mut *tx)
            .await?;
        Ok(answer)
    }

    async fn find_user_answers(
        &self,
        tx: &mut ClientSession,
        visitor_id: i64,
        quiz_id: i64,
    ) -> RepoResult<Vec<UserAnswer>> {
        self.collect(
            self.user_answers(),
            tx,
            doc! { "visitor_id": visitor_id, "quiz_id": quiz_id },
            None,
        )
        .await
    }
}
