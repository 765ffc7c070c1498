use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use log::info;
use unveil_shared::error::{AppError, Result};
use unveil_shared::models::{now_str, AuthUser, Message, MessageType, RsvpStatus};
use unveil_shared::sms::{
    announcement_body, reminder_body, send_to_guests, DeliveryOrigin,
};
use unveil_shared::store::{EventStore, MessageStore};
use uuid::Uuid;

use super::{load_hosted_event, parse_event_id, parse_json, validate_message_content};
use crate::models::{SendAnnouncementRequest, SendReminderRequest, SmsSendResponse};
use crate::state::AppState;

fn require_event_id(event_id: Option<String>) -> Result<String> {
    let event_id = event_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("eventId is required"))?;
    parse_event_id(&event_id)
}

// POST /api/sms/send-announcement
pub async fn send_announcement(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<SendAnnouncementRequest>, JsonRejection>,
) -> Result<Json<SmsSendResponse>> {
    let request = parse_json(payload)?;
    let event_id = require_event_id(request.event_id)?;
    let content = validate_message_content(request.message.as_deref(), "message")?;

    let event = load_hosted_event(state.store.as_ref(), &event_id, &user.id).await?;

    let message = state
        .store
        .create_message(Message {
            id: Uuid::new_v4().to_string(),
            event_id: event.id.clone(),
            sender_user_id: user.id.clone(),
            content: content.clone(),
            message_type: MessageType::Announcement,
            created_at: Some(now_str()),
        })
        .await?;

    let guests = state.store.list_guests(&event.id).await?;
    info!(
        "Sending announcement {} for event {} to {} guests",
        message.id,
        event.id,
        guests.len()
    );

    let result = send_to_guests(
        state.store.as_ref(),
        state.sms.as_ref(),
        &guests,
        &announcement_body(&event, &content),
        &DeliveryOrigin::Message(message.id.clone()),
    )
    .await;

    Ok(Json(SmsSendResponse {
        success: true,
        message_id: Some(message.id),
        sent: result.sent,
        failed: result.failed,
    }))
}

// POST /api/sms/send-reminder
pub async fn send_reminder(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<SendReminderRequest>, JsonRejection>,
) -> Result<Json<SmsSendResponse>> {
    let request = parse_json(payload)?;
    let event_id = require_event_id(request.event_id)?;

    let event = load_hosted_event(state.store.as_ref(), &event_id, &user.id).await?;

    let pending: Vec<_> = state
        .store
        .list_guests(&event.id)
        .await?
        .into_iter()
        .filter(|g| g.rsvp_status == RsvpStatus::Pending)
        .collect();

    info!(
        "Sending RSVP reminder for event {} to {} pending guests",
        event.id,
        pending.len()
    );

    let message = state
        .store
        .create_message(Message {
            id: Uuid::new_v4().to_string(),
            event_id: event.id.clone(),
            sender_user_id: user.id.clone(),
            content: reminder_body(&event),
            message_type: MessageType::Direct,
            created_at: Some(now_str()),
        })
        .await?;

    let result = send_to_guests(
        state.store.as_ref(),
        state.sms.as_ref(),
        &pending,
        &message.content,
        &DeliveryOrigin::Message(message.id.clone()),
    )
    .await;

    Ok(Json(SmsSendResponse {
        success: true,
        message_id: Some(message.id),
        sent: result.sent,
        failed: result.failed,
    }))
}
