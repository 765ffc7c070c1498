use axum::{extract::rejection::JsonRejection, http::HeaderMap, Json};
use log::warn;
use unveil_shared::auth::verify_cron_secret;
use unveil_shared::error::{AppError, Result};
use unveil_shared::models::{Event, EventGuest};
use unveil_shared::sms::MAX_MESSAGE_LENGTH;
use unveil_shared::store::{EventStore, Store};
use uuid::Uuid;

use crate::state::AppState;

pub mod cron_handlers;
pub mod event_handlers;
pub mod message_handlers;
pub mod sms_handlers;
pub mod webhook_handlers;

pub const EVENT_ACCESS_DENIED: &str = "Event not found or access denied";

/// The caller's relationship to an event
pub enum EventRole {
    Host,
    Guest(EventGuest),
}

impl EventRole {
    pub fn is_host(&self) -> bool {
        matches!(self, EventRole::Host)
    }
}

/// Unwraps a JSON body, reporting malformed input as 400 rather than axum's default rejection
pub fn parse_json<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AppError::bad_request(format!("Invalid request body: {}", e.body_text())))
}

/// Trims and bounds user-authored message text
pub fn validate_message_content(content: Option<&str>, field: &str) -> Result<String> {
    let content = content.map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(AppError::bad_request(format!("{} is required", field)));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::bad_request(format!(
            "{} must be {} characters or fewer",
            field, MAX_MESSAGE_LENGTH
        )));
    }
    Ok(content.to_string())
}

/// Event ids are UUIDs; anything else cannot name an event, so it gets the
/// same 404 as a missing one without reaching the store.
pub fn parse_event_id(raw: &str) -> Result<String> {
    Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| {
            warn!("Rejected malformed event id {:?}", raw);
            AppError::not_found(EVENT_ACCESS_DENIED)
        })
}

/// Loads an event only if `user_id` is its host. Non-hosts see the same 404 as a
/// missing event.
pub async fn load_hosted_event(store: &dyn Store, event_id: &str, user_id: &str) -> Result<Event> {
    let event_id = parse_event_id(event_id)?;
    store
        .get_hosted_event(&event_id, user_id)
        .await?
        .ok_or_else(|| {
            warn!("User {} is not the host of event {}", user_id, event_id);
            AppError::not_found(EVENT_ACCESS_DENIED)
        })
}

/// Loads an event the caller hosts or is a guest of
pub async fn load_member_event(
    store: &dyn Store,
    event_id: &str,
    user_id: &str,
) -> Result<(Event, EventRole)> {
    let event_id = parse_event_id(event_id)?;
    let event = store
        .get_event(&event_id)
        .await?
        .ok_or_else(|| AppError::not_found(EVENT_ACCESS_DENIED))?;

    if event.host_user_id == user_id {
        return Ok((event, EventRole::Host));
    }

    match store.get_guest_for_user(&event.id, user_id).await? {
        Some(guest) => Ok((event, EventRole::Guest(guest))),
        None => {
            warn!("User {} is not a member of event {}", user_id, event_id);
            Err(AppError::not_found(EVENT_ACCESS_DENIED))
        }
    }
}

/// Returns the configured cron secret once the request has proven it knows it
pub fn require_cron_secret<'a>(state: &'a AppState, headers: &HeaderMap) -> Result<&'a str> {
    let secret = state
        .cron_secret
        .as_deref()
        .ok_or_else(|| AppError::internal_server_error("CRON_SECRET is not configured"))?;

    if !verify_cron_secret(headers, secret) {
        warn!("Rejected cron request with missing or wrong secret");
        return Err(AppError::unauthorized("Unauthorized"));
    }

    Ok(secret)
}
