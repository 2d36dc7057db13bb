#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use quizdesk_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::NewUser,
    repository::MemoryRepository,
    services::{bootstrap, AppState},
};

pub const TEST_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
}

pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = Config::for_memory(TEST_SECRET);
    let repo = Arc::new(MemoryRepository::unseeded());
    bootstrap::bootstrap(&config, repo.as_ref())
        .await
        .expect("Failed to bootstrap test storage");

    let router = create_router(Arc::new(AppState::new(config, repo.clone())));
    TestApp { router, repo }
}

impl TestApp {
    /// Creates a user and returns `(id, bearer token)`.
    pub async fn user(&self, username: &str, is_superuser: bool) -> (i64, String) {
        let (user, _) = bootstrap::ensure_user(
            self.repo.as_ref(),
            NewUser {
                username: username.to_string(),
                is_superuser,
            },
        )
        .await
        .expect("Failed to create test user");

        let token = JwtService::new(TEST_SECRET)
            .generate_token(&JwtClaims::for_user(&user, 3600))
            .expect("Failed to sign test token");
        (user.id, token)
    }

    pub async fn author(&self) -> String {
        self.user("author", true).await.1
    }

    pub async fn visitor(&self, username: &str) -> String {
        self.user(username, false).await.1
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_string(&value).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Creates a quiz as `token` and returns its id.
    pub async fn create_quiz(&self, token: &str, start: &str, end: &str) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                "/api/v1/quizzes",
                Some(token),
                Some(json!({
                    "name": "Customer survey",
                    "description": "How are we doing?",
                    "date_start": start,
                    "date_end": end,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }

    /// Adds questions and returns the rendered quiz.
    pub async fn add_questions(&self, token: &str, quiz_id: i64, questions: Value) -> Value {
        let (status, body) = self
            .request(
                "POST",
                &format!("/api/v1/quizzes/{}/questions", quiz_id),
                Some(token),
                Some(json!({ "questions": questions })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}

/// Window that contains the current moment.
pub fn open_window() -> (String, String) {
    let now = chrono::Utc::now();
    let fmt = "%d.%m.%Y %H:%M";
    (
        (now - chrono::Duration::days(1)).format(fmt).to_string(),
        (now + chrono::Duration::days(1)).format(fmt).to_string(),
    )
}

pub fn three_questions() -> Value {
    json!([
        { "text": "What do you like most?", "type_question": 1 },
        { "text": "Would you recommend us?", "type_question": 2, "variable_answer": ["Yes"] },
        { "text": "Which products do you use?", "type_question": 3, "variable_answer": ["App", "Web"] }
    ])
}
