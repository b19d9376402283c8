use crate::e2e::helpers;

use helpers::TestContext;
use hyper::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_save_and_return_lesson_words(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/lessons/3/7/words",
            &json!(["pear, apple", " plum ", "apple"]),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.body.as_ref().unwrap()["message"], "Words saved");

    let response = ctx.client.get("/api/lessons/3/7/words").await.unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(
        response.data(),
        &json!({ "words": ["apple", "pear", "plum"], "total": 3 })
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_not_found_for_unknown_lesson(ctx: &TestContext) {
    let response = ctx.client.get("/api/lessons/9/9/words").await.unwrap();

    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_error_message("lesson 9 / 9");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_word_list(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/lessons/1/1/words", &json!([" ", ","]))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("Word list cannot be empty");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_list_lessons_with_word_counts(ctx: &TestContext) {
    ctx.client
        .post("/api/lessons/2/1/words", &json!(["cat", "dog"]))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);
    ctx.client
        .post("/api/lessons/1/4/words", &json!(["sun"]))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let response = ctx.client.get("/api/lessons").await.unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(
        response.data(),
        &json!([
            { "grade": "1", "lesson": "4", "wordCount": 1 },
            { "grade": "2", "lesson": "1", "wordCount": 2 }
        ])
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_not_require_a_session_for_lessons(ctx: &TestContext) {
    ctx.client
        .post("/api/lessons/5/5/words", &json!(["owl"]))
        .await
        .unwrap()
        .assert_status(StatusCode::OK);

    let status = ctx.client.get("/api/status").await.unwrap();
    assert_eq!(status.data()["currentConcurrency"], 0);
}
