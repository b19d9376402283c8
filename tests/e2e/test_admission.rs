use crate::e2e::helpers;

use helpers::{TestContext, MAX_SESSIONS, REJECTED_WORD};
use hyper::StatusCode;
use serde_json::json;
use test_context::test_context;

async fn speak(ctx: &TestContext, session: &str) -> StatusCode {
    ctx.client
        .post_with_session("/api/tts", &json!({ "text": "apple" }), session)
        .await
        .unwrap()
        .status
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_sessions_beyond_capacity(ctx: &TestContext) {
    for i in 0..MAX_SESSIONS {
        assert_eq!(speak(ctx, &format!("session-{}", i)).await, StatusCode::OK);
    }

    let response = ctx
        .client
        .post_with_session("/api/tts", &json!({ "text": "apple" }), "session-late")
        .await
        .unwrap();

    response
        .assert_status(StatusCode::SERVICE_UNAVAILABLE)
        .assert_error_message("Service busy");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_let_admitted_sessions_continue(ctx: &TestContext) {
    for i in 0..MAX_SESSIONS {
        assert_eq!(speak(ctx, &format!("session-{}", i)).await, StatusCode::OK);
    }

    // Active sessions keep their slot and are not counted twice
    assert_eq!(speak(ctx, "session-0").await, StatusCode::OK);
    assert_eq!(speak(ctx, "session-1").await, StatusCode::OK);

    let status = ctx.client.get("/api/status").await.unwrap();
    assert_eq!(status.data()["currentConcurrency"], MAX_SESSIONS);
    assert_eq!(status.data()["waiting"], 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_release_slot_when_first_request_fails(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_session("/api/tts", &json!({ "text": REJECTED_WORD }), "session-0")
        .await
        .unwrap();
    response.assert_status(StatusCode::BAD_GATEWAY);

    assert_eq!(ctx.admission.status().current_concurrency, 0);

    for i in 1..=MAX_SESSIONS {
        assert_eq!(speak(ctx, &format!("session-{}", i)).await, StatusCode::OK);
    }
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_count_blocked_requests_as_waiting(ctx: &TestContext) {
    for i in 0..MAX_SESSIONS {
        assert_eq!(speak(ctx, &format!("session-{}", i)).await, StatusCode::OK);
    }

    let client = ctx.client.clone();
    let blocked = tokio::spawn(async move {
        client
            .post_with_session("/api/tts", &json!({ "text": "apple" }), "session-late")
            .await
            .unwrap()
            .status
    });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(ctx.admission.status().waiting, 1);

    assert_eq!(blocked.await.unwrap(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ctx.admission.status().waiting, 0);
}
