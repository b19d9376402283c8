use crate::e2e::helpers;

use helpers::{ScriptedBackend, TestContext, REJECTED_WORD};
use hyper::StatusCode;
use serde_json::json;
use test_context::test_context;

const SESSION: &str = "session-tts";

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_synthesize_text_to_speech(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_session("/api/tts", &json!({ "text": "apple" }), SESSION)
        .await
        .unwrap();

    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/mpeg")
        .assert_header_exists("x-cache-key");

    assert_eq!(response.body_bytes, ScriptedBackend::audio_for("apple"));

    let cache_key = response.header("x-cache-key").unwrap();
    assert_eq!(
        response.header("content-disposition").unwrap(),
        &format!("attachment; filename=\"{}.mp3\"", cache_key)
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_serve_repeated_text_from_cache(ctx: &TestContext) {
    let first = ctx
        .client
        .post_with_session("/api/tts", &json!({ "text": "apple" }), SESSION)
        .await
        .unwrap();
    // Same text after whitespace normalization
    let second = ctx
        .client
        .post_with_session("/api/tts", &json!({ "text": "  apple " }), SESSION)
        .await
        .unwrap();

    first.assert_status(StatusCode::OK);
    second.assert_status(StatusCode::OK);
    assert_eq!(first.body_bytes, second.body_bytes);
    assert_eq!(first.header("x-cache-key"), second.header("x-cache-key"));
    assert_eq!(ctx.backend.calls(), 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_share_one_backend_call_between_concurrent_requests(ctx: &TestContext) {
    let mut futures = Vec::new();
    for _ in 0..5 {
        let client = ctx.client.clone();
        futures.push(async move {
            client
                .post_with_session("/api/tts", &json!({ "text": "pear" }), SESSION)
                .await
        });
    }

    for result in futures::future::join_all(futures).await {
        let response = result.unwrap();
        response.assert_status(StatusCode::OK);
        assert_eq!(response.body_bytes, ScriptedBackend::audio_for("pear"));
    }
    assert_eq!(ctx.backend.calls(), 1);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_missing_session_id(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/tts", &json!({ "text": "apple" }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("X-Session-ID");
    assert_eq!(ctx.backend.calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_session("/api/tts", &json!({ "text": "   " }), SESSION)
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("empty");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_unknown_and_client_side_engines(ctx: &TestContext) {
    for engine in ["edge", "web-speech", "openai"] {
        let response = ctx
            .client
            .post_with_session(
                "/api/tts",
                &json!({ "text": "apple", "engine": engine }),
                SESSION,
            )
            .await
            .unwrap();

        response
            .assert_status(StatusCode::BAD_REQUEST)
            .assert_error_message("Unsupported TTS engine");
    }
    assert_eq!(ctx.backend.calls(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_backend_rejection_as_bad_gateway(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_session("/api/tts", &json!({ "text": REJECTED_WORD }), SESSION)
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_GATEWAY);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_assemble_batch_and_list_failed_words(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_session(
            "/api/tts/batch",
            &json!({
                "words": ["apple", REJECTED_WORD, "plum"],
                "repeatCount": 2,
                "repeatInterval": 0,
                "grade": "3",
                "lesson": "7"
            }),
            SESSION,
        )
        .await
        .unwrap();

    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "audio/mpeg")
        .assert_header(
            "content-disposition",
            "attachment; filename=\"dictation_3_7.mp3\"",
        )
        .assert_header("x-failed-words", "%5B%22explode%22%5D");

    let audio = response.text();
    assert!(audio.starts_with("[intro]"));
    assert!(audio.ends_with("[outro]"));
    assert_eq!(audio.matches("<apple>").count(), 2);
    assert_eq!(audio.matches("<plum>").count(), 2);
    assert!(!audio.contains(REJECTED_WORD));
    assert!(audio.find("<apple>").unwrap() < audio.find("<plum>").unwrap());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fail_batch_when_every_word_fails(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_session(
            "/api/tts/batch",
            &json!({ "words": [REJECTED_WORD] }),
            SESSION,
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_GATEWAY);

    let failed = response
        .body
        .as_ref()
        .and_then(|b| b.get("failed_words"))
        .cloned()
        .unwrap();
    assert_eq!(failed, json!([REJECTED_WORD]));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_validate_batch_repeat_settings(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_session(
            "/api/tts/batch",
            &json!({ "words": ["apple"], "repeatCount": 0 }),
            SESSION,
        )
        .await
        .unwrap();
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = ctx
        .client
        .post_with_session(
            "/api/tts/batch",
            &json!({ "words": [" ", ""] }),
            SESSION,
        )
        .await
        .unwrap();
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_stream_cache_warmup_progress(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_session(
            "/api/tts/check-cache",
            &json!({ "words": ["apple", "pear"] }),
            SESSION,
        )
        .await
        .unwrap();

    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "text/event-stream");

    let body = response.text();
    assert_eq!(body.matches(r#""total":2"#).count(), 2);
    assert!(body.contains(r#""progress":2"#));
    assert!(body.contains(r#""ready":true"#));
    assert_eq!(ctx.backend.calls(), 2);

    // Warmed words are now served without touching the backend
    let response = ctx
        .client
        .post_with_session("/api/tts", &json!({ "text": "pear" }), SESSION)
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(ctx.backend.calls(), 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_failed_words_in_cache_warmup(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_session(
            "/api/tts/check-cache",
            &json!({ "words": ["apple", REJECTED_WORD] }),
            SESSION,
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);

    let body = response.text();
    assert!(body.contains(r#""failed_words":["explode"]"#));
    assert!(!body.contains(r#""ready":true"#));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_list_voices_without_a_session(ctx: &TestContext) {
    let response = ctx.client.get("/api/tts/voices").await.unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.data()[0]["name"], "Joanna");

    let response = ctx
        .client
        .get("/api/tts/voices?engine=web-speech")
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.data(), &json!([]));
}
