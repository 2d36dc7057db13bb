use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_add_questions_in_order() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let quiz_id = app
        .create_quiz(&author, "12.02.2007 10:10", "12.02.2025 10:10")
        .await;

    let quiz = app
        .add_questions(&author, quiz_id, common::three_questions())
        .await;
    let questions = quiz["questions"].as_array().unwrap();

    assert_eq!(questions.len(), 3);
    assert_eq!(questions[0]["position"], 0);
    assert_eq!(questions[1]["position"], 1);
    assert_eq!(questions[2]["position"], 2);
    assert_eq!(questions[0]["type_question_name"], "Free text");
    assert_eq!(questions[1]["type_question_name"], "Single choice");
    assert_eq!(questions[2]["type_question_name"], "Multiple choice");
    assert_eq!(questions[2]["variable_answer"][1]["text"], "Web");
}

#[tokio::test]
async fn test_batch_skips_invalid_items() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let quiz_id = app
        .create_quiz(&author, "12.02.2007 10:10", "12.02.2025 10:10")
        .await;

    let quiz = app
        .add_questions(
            &author,
            quiz_id,
            json!([
                { "text": "No type at all" },
                { "text": "Unknown type", "type_question": 9 },
                { "text": "Choice without options", "type_question": 3 },
                { "text": "Survivor", "type_question": 1 }
            ]),
        )
        .await;

    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["question"], "Survivor");
    assert_eq!(questions[0]["position"], 0);
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let quiz_id = app
        .create_quiz(&author, "12.02.2007 10:10", "12.02.2025 10:10")
        .await;

    let (status, body) = app
        .request(
            "POST",
            &format!("/api/v1/quizzes/{}/questions", quiz_id),
            Some(&author),
            Some(json!({ "questions": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("questions"));
}

#[tokio::test]
async fn test_questions_for_foreign_quiz_are_refused() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let (_, other_author) = app.user("other", true).await;
    let quiz_id = app
        .create_quiz(&author, "12.02.2007 10:10", "12.02.2025 10:10")
        .await;

    let (status, _) = app
        .request(
            "POST",
            &format!("/api/v1/quizzes/{}/questions", quiz_id),
            Some(&other_author),
            Some(json!({ "questions": common::three_questions() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_question_type_and_options() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let quiz_id = app
        .create_quiz(&author, "12.02.2007 10:10", "12.02.2025 10:10")
        .await;
    let quiz = app
        .add_questions(&author, quiz_id, common::three_questions())
        .await;
    let multi_id = quiz["questions"][2]["id"].as_i64().unwrap();
    let uri = format!("/api/v1/questions/{}", multi_id);

    // Extra option appended
    let (status, body) = app
        .request(
            "PATCH",
            &uri,
            Some(&author),
            Some(json!({ "variable_answer": ["Desktop"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["questions"][2]["variable_answer"]
            .as_array()
            .unwrap()
            .len(),
        3
    );

    // Switch to free text drops the options
    let (status, body) = app
        .request(
            "PATCH",
            &uri,
            Some(&author),
            Some(json!({ "text": "Which product, in your words?", "type_question": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["questions"][2]["question"], "Which product, in your words?");
    assert_eq!(body["questions"][2]["type_question_id"], 1);
    assert_eq!(body["questions"][2]["variable_answer"], json!([]));
}

#[tokio::test]
async fn test_delete_question_keeps_positions() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let quiz_id = app
        .create_quiz(&author, "12.02.2007 10:10", "12.02.2025 10:10")
        .await;
    let quiz = app
        .add_questions(&author, quiz_id, common::three_questions())
        .await;
    let first_id = quiz["questions"][0]["id"].as_i64().unwrap();

    let (status, body) = app
        .request(
            "DELETE",
            &format!("/api/v1/questions/{}", first_id),
            Some(&author),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let positions: Vec<i64> = body["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["position"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![1, 2]);

    let quiz = app
        .add_questions(
            &author,
            quiz_id,
            json!([{ "text": "Anything else?", "type_question": 1 }]),
        )
        .await;
    assert_eq!(quiz["questions"][2]["position"], 3);
}

#[tokio::test]
async fn test_missing_question_is_not_found() {
    let app = common::create_test_app().await;
    let author = app.author().await;
    let (status, _) = app
        .request("DELETE", "/api/v1/questions/4242", Some(&author), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
