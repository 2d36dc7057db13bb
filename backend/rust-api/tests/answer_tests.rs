use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

struct Survey {
    quiz_id: i64,
    free_id: i64,
    single_id: i64,
    single_option: i64,
    multi_id: i64,
    multi_options: Vec<i64>,
}

async fn survey(app: &common::TestApp, author: &str, start: &str, end: &str) -> Survey {
    let quiz_id = app.create_quiz(author, start, end).await;
    let quiz = app
        .add_questions(author, quiz_id, common::three_questions())
        .await;
    let q = &quiz["questions"];
    let id = |v: &Value| v.as_i64().unwrap();

    Survey {
        quiz_id,
        free_id: id(&q[0]["id"]),
        single_id: id(&q[1]["id"]),
        single_option: id(&q[1]["variable_answer"][0]["id"]),
        multi_id: id(&q[2]["id"]),
        multi_options: q[2]["variable_answer"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| id(&o["id"]))
            .collect(),
    }
}

fn full_answers(s: &Survey) -> Value {
    json!({
        "answers": [
            { "id": s.free_id, "text": "Fast delivery" },
            { "id": s.single_id, "variable": [s.single_option] },
            { "id": s.multi_id, "variable": s.multi_options },
        ]
    })
}

fn answers_uri(s: &Survey) -> String {
    format!("/api/v1/visitor/quizzes/{}/answers", s.quiz_id)
}

#[tokio::test]
async fn test_submission_shows_up_in_history() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let visitor = app.visitor("visitor").await;
    let s = survey(&app, &author, "12.02.2007 10:10", "12.02.2025 10:10").await;

    let (status, body) = app
        .request("POST", &answers_uri(&s), Some(&visitor), Some(full_answers(&s)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "detail": "answers recorded" }));

    let (status, history) = app
        .request("GET", "/api/v1/visitor/answers", Some(&visitor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], s.quiz_id);
    assert!(entries[0].get("questions").is_none());

    let answers = entries[0]["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 3);
    assert_eq!(answers[0]["question"], s.free_id);
    assert_eq!(answers[0]["answer_text"], "Fast delivery");
    assert_eq!(answers[1]["variable_answer_ids"], json!([s.single_option]));
    assert_eq!(answers[1]["variable_answer_text"], json!(["Yes"]));
    assert_eq!(answers[2]["variable_answer_ids"], json!(s.multi_options));
    assert_eq!(answers[2]["variable_answer_text"], json!(["App", "Web"]));
}

#[tokio::test]
async fn test_mismatch_invalid_success_duplicate() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let visitor = app.visitor("visitor").await;
    let s = survey(&app, &author, "12.02.2007 10:10", "12.02.2025 10:10").await;

    // Two of three
    let (status, body) = app
        .request(
            "POST",
            &answers_uri(&s),
            Some(&visitor),
            Some(json!({
                "answers": [
                    { "id": s.free_id, "text": "Fast delivery" },
                    { "id": s.single_id, "variable": [s.single_option] },
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("not every question has been answered"));

    // Unknown option on the multi-choice question
    let (status, body) = app
        .request(
            "POST",
            &answers_uri(&s),
            Some(&visitor),
            Some(json!({
                "answers": [
                    { "id": s.free_id, "text": "Fast delivery" },
                    { "id": s.single_id, "variable": [s.single_option] },
                    { "id": s.multi_id, "variable": [s.multi_options[0], 99999] },
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_options");
    assert_eq!(body["question"], s.multi_id);

    let (status, _) = app
        .request("POST", &answers_uri(&s), Some(&visitor), Some(full_answers(&s)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request("POST", &answers_uri(&s), Some(&visitor), Some(full_answers(&s)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already been answered"));
}

#[tokio::test]
async fn test_rejected_submission_stores_nothing() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let visitor = app.visitor("visitor").await;
    let s = survey(&app, &author, "12.02.2007 10:10", "12.02.2025 10:10").await;

    let (status, body) = app
        .request(
            "POST",
            &answers_uri(&s),
            Some(&visitor),
            Some(json!({
                "answers": [
                    { "id": s.free_id, "text": "" },
                    { "id": s.single_id, "variable": [s.single_option] },
                    { "id": s.multi_id, "variable": s.multi_options },
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_text");

    let (_, history) = app
        .request("GET", "/api/v1/visitor/answers", Some(&visitor), None)
        .await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_answering_unknown_quiz_fails() {
    let app = common::create_test_app().await;
    let visitor = app.visitor("visitor").await;

    let (status, body) = app
        .request(
            "POST",
            "/api/v1/visitor/quizzes/31337/answers",
            Some(&visitor),
            Some(json!({ "answers": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_active_list_per_visitor() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let first = app.visitor("first").await;
    let second = app.visitor("second").await;
    let (start, end) = common::open_window();
    let open = survey(&app, &author, &start, &end).await;
    let _closed = survey(&app, &author, "12.02.2007 10:10", "12.02.2008 10:10").await;

    let (status, active) = app
        .request("GET", "/api/v1/visitor/quizzes", Some(&first), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let active = active.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], open.quiz_id);
    assert_eq!(active[0]["questions"].as_array().unwrap().len(), 3);

    let (status, _) = app
        .request("POST", &answers_uri(&open), Some(&first), Some(full_answers(&open)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, active) = app
        .request("GET", "/api/v1/visitor/quizzes", Some(&first), None)
        .await;
    assert_eq!(active, json!([]));

    let (_, active) = app
        .request("GET", "/api/v1/visitor/quizzes", Some(&second), None)
        .await;
    assert_eq!(active.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_history_is_private() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let first = app.visitor("first").await;
    let second = app.visitor("second").await;
    let s = survey(&app, &author, "12.02.2007 10:10", "12.02.2025 10:10").await;

    app.request("POST", &answers_uri(&s), Some(&first), Some(full_answers(&s)))
        .await;

    let (_, history) = app
        .request("GET", "/api/v1/visitor/answers", Some(&second), None)
        .await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_history_survives_switch_to_free_text() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let visitor = app.visitor("visitor").await;
    let s = survey(&app, &author, "12.02.2007 10:10", "12.02.2025 10:10").await;

    app.request("POST", &answers_uri(&s), Some(&visitor), Some(full_answers(&s)))
        .await;
    let (status, _) = app
        .request(
            "PATCH",
            &format!("/api/v1/questions/{}", s.multi_id),
            Some(&author),
            Some(json!({ "type_question": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = app
        .request("GET", "/api/v1/visitor/answers", Some(&visitor), None)
        .await;
    assert_eq!(
        history[0]["answers"][2]["variable_answer_text"],
        json!(["App", "Web"])
    );
}

#[tokio::test]
async fn test_quiz_without_questions_is_not_offered() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let visitor = app.visitor("visitor").await;
    let (start, end) = common::open_window();
    let quiz_id = app.create_quiz(&author, &start, &end).await;

    let (_, active) = app
        .request("GET", "/api/v1/visitor/quizzes", Some(&visitor), None)
        .await;
    assert_eq!(active, json!([]));

    let uri = format!("/api/v1/visitor/quizzes/{}/answers", quiz_id);
    for _ in 0..2 {
        let (status, body) = app
            .request("POST", &uri, Some(&visitor), Some(json!({ "answers": [] })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("unavailable"));
    }
}
