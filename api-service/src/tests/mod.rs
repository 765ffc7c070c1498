mod cron_handlers_test;

use std::sync::Arc;

use axum::Router;
use chrono::NaiveDate;
use reqwest::Client;
use unveil_shared::models::{Event, EventGuest, RsvpStatus};
use unveil_shared::test_utils::mock_auth::MockAuthVerifier;
use unveil_shared::test_utils::mock_sms::MockSmsSender;
use unveil_shared::test_utils::mock_store::MockStore;
use unveil_shared::test_utils::test_logging::init_test_logging;

use crate::routes::create_router_with_state;
use crate::state::AppState;

pub const EVENT_ID: &str = "6f1c2d3e-4b5a-4c6d-8e7f-9a0b1c2d3e4f";
pub const HOST_ID: &str = "host-1";
pub const HOST_TOKEN: &str = "host-token";
pub const GUEST_ID: &str = "guest-user-1";
pub const GUEST_TOKEN: &str = "guest-token";
pub const OUTSIDER_TOKEN: &str = "outsider-token";
pub const CRON_SECRET: &str = "cron-secret";

pub struct TestContext {
    pub app: Router,
    pub store: Arc<MockStore>,
    pub sms: Arc<MockSmsSender>,
}

pub fn test_event() -> Event {
    Event {
        id: EVENT_ID.to_string(),
        title: "Sam & Alex".to_string(),
        event_date: NaiveDate::from_ymd_opt(2027, 6, 12).unwrap(),
        location: Some("Lake House".to_string()),
        host_user_id: HOST_ID.to_string(),
        created_at: None,
    }
}

pub fn test_guest(
    id: &str,
    user_id: Option<&str>,
    phone: &str,
    rsvp_status: RsvpStatus,
    sms_opt_out: bool,
) -> EventGuest {
    EventGuest {
        id: id.to_string(),
        event_id: EVENT_ID.to_string(),
        user_id: user_id.map(String::from),
        guest_name: Some(format!("Guest {}", id)),
        phone: Some(phone.to_string()),
        rsvp_status,
        sms_opt_out,
        created_at: None,
    }
}

/// Seeds one event with three guests: a pending registered guest, an attending
/// guest, and a pending guest who opted out of SMS.
pub fn seed_store(store: &MockStore) {
    store.insert_event(test_event());
    store.insert_guest(test_guest(
        "g1",
        Some(GUEST_ID),
        "555-000-0001",
        RsvpStatus::Pending,
        false,
    ));
    store.insert_guest(test_guest(
        "g2",
        None,
        "(555) 000-0002",
        RsvpStatus::Attending,
        false,
    ));
    store.insert_guest(test_guest(
        "g3",
        None,
        "555-000-0003",
        RsvpStatus::Pending,
        true,
    ));
}

pub fn create_test_app() -> TestContext {
    create_test_app_with(|_| {})
}

/// Builds the router over mock collaborators; `configure` can adjust the state
/// before the router is built.
pub fn create_test_app_with<F>(configure: F) -> TestContext
where
    F: FnOnce(&mut AppState),
{
    init_test_logging();

    let store = Arc::new(MockStore::new());
    seed_store(&store);
    let sms = Arc::new(MockSmsSender::new());
    let auth = MockAuthVerifier::new()
        .with_user(HOST_TOKEN, HOST_ID)
        .with_user(GUEST_TOKEN, GUEST_ID)
        .with_user(OUTSIDER_TOKEN, "outsider-1");

    let mut state = AppState {
        store: store.clone(),
        auth: Arc::new(auth),
        sms: sms.clone(),
        http: Client::new(),
        cron_secret: Some(CRON_SECRET.to_string()),
        processor_url: "http://127.0.0.1:9/api/messages/process-scheduled".to_string(),
        twilio_webhook: None,
    };
    configure(&mut state);

    TestContext {
        app: create_router_with_state(state),
        store,
        sms,
    }
}
