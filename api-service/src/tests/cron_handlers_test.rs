use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use unveil_shared::models::{RecipientFilter, ScheduledMessage, ScheduledStatus};
use unveil_shared::test_utils::http_test_utils::{create_test_request, response_to_json};

use super::{create_test_app, create_test_app_with, CRON_SECRET, EVENT_ID, HOST_ID};

const MISSING_EVENT_ID: &str = "0d9c8b7a-6f5e-4d3c-9b2a-1f0e9d8c7b6a";

fn scheduled(id: &str, event_id: &str, minutes_from_now: i64, filter: RecipientFilter) -> ScheduledMessage {
    ScheduledMessage {
        id: id.to_string(),
        event_id: event_id.to_string(),
        sender_user_id: HOST_ID.to_string(),
        content: "Brunch is at 10".to_string(),
        send_at: Utc::now() + Duration::minutes(minutes_from_now),
        status: ScheduledStatus::Scheduled,
        recipient_filter: filter,
        sent_count: 0,
        failed_count: 0,
        sent_at: None,
        created_at: None,
    }
}

#[tokio::test]
async fn test_cron_without_secret_is_unauthorized() {
    let ctx = create_test_app();

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "GET",
            "/api/cron/process-messages",
            None,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["error"], "Unauthorized");
}

#[tokio::test]
async fn test_cron_with_wrong_secret_is_unauthorized() {
    let ctx = create_test_app();

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/api/cron/process-messages",
            Some("not-the-secret"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_without_configured_secret_is_internal_error() {
    let ctx = create_test_app_with(|state| state.cron_secret = None);

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "GET",
            "/api/cron/process-messages",
            Some(CRON_SECRET),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_cron_relays_processor_response() {
    let mut server = mockito::Server::new_async().await;
    let processor_body = json!({
        "success": true,
        "processed": 3,
        "sent": 12,
        "failed": 1,
        "errors": [],
        "extra": { "batch": "nightly" }
    });
    let mock = server
        .mock("POST", "/api/messages/process-scheduled")
        .match_header("authorization", format!("Bearer {}", CRON_SECRET).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(processor_body.to_string())
        .expect(2)
        .create_async()
        .await;

    let processor_url = format!("{}/api/messages/process-scheduled", server.url());
    let ctx = create_test_app_with(|state| state.processor_url = processor_url);

    for method in ["GET", "POST"] {
        let response = ctx
            .app
            .clone()
            .oneshot(create_test_request(
                method,
                "/api/cron/process-messages",
                Some(CRON_SECRET),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json_resp = response_to_json(response).await;
        assert_eq!(json_resp, processor_body);
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_cron_relays_processor_failure_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/messages/process-scheduled")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"database unavailable"}"#)
        .create_async()
        .await;

    let processor_url = format!("{}/api/messages/process-scheduled", server.url());
    let ctx = create_test_app_with(|state| state.processor_url = processor_url);

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "GET",
            "/api/cron/process-messages",
            Some(CRON_SECRET),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["error"], "database unavailable");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cron_with_invalid_processor_json_is_internal_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/messages/process-scheduled")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let processor_url = format!("{}/api/messages/process-scheduled", server.url());
    let ctx = create_test_app_with(|state| state.processor_url = processor_url);

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "GET",
            "/api/cron/process-messages",
            Some(CRON_SECRET),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_process_scheduled_requires_secret() {
    let ctx = create_test_app();

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/api/messages/process-scheduled",
            None,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_process_scheduled_sends_due_messages() {
    let ctx = create_test_app();
    ctx.store
        .insert_scheduled(scheduled("s-due", EVENT_ID, -5, RecipientFilter::Attending));
    ctx.store
        .insert_scheduled(scheduled("s-later", EVENT_ID, 60, RecipientFilter::All));

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/api/messages/process-scheduled",
            Some(CRON_SECRET),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["success"], true);
    assert_eq!(json_resp["processed"], 1);
    assert_eq!(json_resp["sent"], 1);
    assert_eq!(json_resp["failed"], 0);
    assert_eq!(json_resp["errors"], json!([]));

    let sent = ctx.sms.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "+15550000002");
    assert_eq!(sent[0].body, "Sam & Alex: Brunch is at 10");

    let due = ctx.store.scheduled("s-due").unwrap();
    assert_eq!(due.status, ScheduledStatus::Sent);
    assert_eq!(due.sent_count, 1);
    assert!(due.sent_at.is_some());

    let later = ctx.store.scheduled("s-later").unwrap();
    assert_eq!(later.status, ScheduledStatus::Scheduled);

    let deliveries = ctx.store.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].scheduled_message_id.as_deref(), Some("s-due"));
    assert!(deliveries[0].message_id.is_none());
}

#[tokio::test]
async fn test_process_scheduled_does_not_resend() {
    let ctx = create_test_app();
    ctx.store
        .insert_scheduled(scheduled("s-due", EVENT_ID, -5, RecipientFilter::All));

    for _ in 0..2 {
        let response = ctx
            .app
            .clone()
            .oneshot(create_test_request(
                "POST",
                "/api/messages/process-scheduled",
                Some(CRON_SECRET),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // g1 and g2 once each; g3 opted out
    assert_eq!(ctx.sms.sent().len(), 2);
}

#[tokio::test]
async fn test_process_scheduled_reports_missing_event() {
    let ctx = create_test_app();
    ctx.store
        .insert_scheduled(scheduled("s-orphan", MISSING_EVENT_ID, -1, RecipientFilter::All));

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/api/messages/process-scheduled",
            Some(CRON_SECRET),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["processed"], 0);
    assert_eq!(json_resp["errors"][0]["id"], "s-orphan");
    assert!(json_resp["errors"][0]["error"]
        .as_str()
        .unwrap()
        .contains(MISSING_EVENT_ID));

    let orphan = ctx.store.scheduled("s-orphan").unwrap();
    assert_eq!(orphan.status, ScheduledStatus::Failed);
    assert!(ctx.sms.sent().is_empty());
}

#[tokio::test]
async fn test_process_scheduled_marks_all_failed_sends() {
    let ctx = create_test_app();
    ctx.sms.fail_for("+15550000002");
    ctx.store
        .insert_scheduled(scheduled("s-due", EVENT_ID, -1, RecipientFilter::Attending));

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/api/messages/process-scheduled",
            Some(CRON_SECRET),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["processed"], 1);
    assert_eq!(json_resp["sent"], 0);
    assert_eq!(json_resp["failed"], 1);

    let due = ctx.store.scheduled("s-due").unwrap();
    assert_eq!(due.status, ScheduledStatus::Failed);
    assert_eq!(due.failed_count, 1);
}

#[tokio::test]
async fn test_process_scheduled_handles_at_most_fifty_oldest_first() {
    let ctx = create_test_app();
    for i in 0..51 {
        ctx.store.insert_scheduled(scheduled(
            &format!("s-{:02}", i),
            EVENT_ID,
            -200 + i,
            RecipientFilter::Attending,
        ));
    }

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/api/messages/process-scheduled",
            Some(CRON_SECRET),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["processed"], 50);
    assert_eq!(json_resp["sent"], 50);

    assert_eq!(ctx.store.scheduled("s-00").unwrap().status, ScheduledStatus::Sent);
    assert_eq!(ctx.store.scheduled("s-49").unwrap().status, ScheduledStatus::Sent);
    // the most recently due row waits for the next run
    assert_eq!(
        ctx.store.scheduled("s-50").unwrap().status,
        ScheduledStatus::Scheduled
    );
}

#[tokio::test]
async fn test_process_scheduled_keeps_sent_counts_when_completion_fails() {
    let ctx = create_test_app();
    ctx.store.fail_scheduled_completion(true);
    ctx.store
        .insert_scheduled(scheduled("s-due", EVENT_ID, -1, RecipientFilter::Attending));

    let response = ctx
        .app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/api/messages/process-scheduled",
            Some(CRON_SECRET),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["processed"], 1);
    assert_eq!(json_resp["sent"], 1);
    assert_eq!(json_resp["failed"], 0);
    assert_eq!(json_resp["errors"].as_array().unwrap().len(), 1);
    assert_eq!(json_resp["errors"][0]["id"], "s-due");
    assert!(json_resp["errors"][0]["error"]
        .as_str()
        .unwrap()
        .contains("Failed to record completion"));

    assert_eq!(ctx.sms.sent().len(), 1);
    assert_eq!(ctx.store.scheduled("s-due").unwrap().status, ScheduledStatus::Sending);
}
