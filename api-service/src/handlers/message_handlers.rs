use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use unveil_shared::error::{AppError, Result};
use unveil_shared::models::{
    now_str, AuthUser, Message, MessageType, PublicUserProfile, ScheduledMessage, ScheduledStatus,
};
use unveil_shared::store::{EventStore, MessageStore};
use uuid::Uuid;

use super::{
    load_hosted_event, load_member_event, parse_json, validate_message_content, EventRole,
    EVENT_ACCESS_DENIED,
};
use crate::models::{
    CreateMessageRequest, MessageResponse, ScheduleMessageRequest, ScheduledMessageResponse,
};
use crate::state::AppState;

// GET /api/events/:id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>> {
    let (event, role) = load_member_event(state.store.as_ref(), &event_id, &user.id).await?;

    // Guests only see direct messages they wrote themselves.
    let messages: Vec<Message> = state
        .store
        .list_messages(&event.id)
        .await?
        .into_iter()
        .filter(|m| {
            role.is_host()
                || m.message_type != MessageType::Direct
                || m.sender_user_id == user.id
        })
        .collect();

    let mut sender_ids: Vec<String> = messages.iter().map(|m| m.sender_user_id.clone()).collect();
    sender_ids.sort();
    sender_ids.dedup();

    let profiles: HashMap<String, PublicUserProfile> = match state.store.get_profiles(&sender_ids).await {
        Ok(profiles) => profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        Err(e) => {
            warn!("Failed to load sender profiles for event {}: {}", event.id, e);
            HashMap::new()
        }
    };

    let messages: Vec<MessageResponse> = messages
        .into_iter()
        .map(|m| MessageResponse::with_sender(m, &profiles))
        .collect();

    Ok(Json(serde_json::json!({ "messages": messages })))
}

// POST /api/events/:id/messages
pub async fn create_message(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let request = parse_json(payload)?;
    let content = validate_message_content(request.content.as_deref(), "content")?;
    let message_type = request.message_type.unwrap_or_default();

    let (event, role) = load_member_event(state.store.as_ref(), &event_id, &user.id).await?;

    if message_type == MessageType::Announcement && !role.is_host() {
        warn!(
            "Guest {} tried to post an announcement to event {}",
            user.id, event.id
        );
        return Err(AppError::not_found(EVENT_ACCESS_DENIED));
    }

    let message = state
        .store
        .create_message(Message {
            id: Uuid::new_v4().to_string(),
            event_id: event.id.clone(),
            sender_user_id: user.id.clone(),
            content,
            message_type,
            created_at: Some(now_str()),
        })
        .await?;

    if let EventRole::Guest(guest) = &role {
        info!("Guest {} posted message {}", guest.id, message.id);
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": MessageResponse::from(message) })),
    ))
}

// POST /api/events/:id/scheduled-messages
pub async fn schedule_message(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<ScheduleMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let request = parse_json(payload)?;
    let content = validate_message_content(request.content.as_deref(), "content")?;

    let send_at = request
        .send_at
        .as_deref()
        .ok_or_else(|| AppError::bad_request("sendAt is required"))?;
    let send_at = DateTime::parse_from_rfc3339(send_at)
        .map_err(|_| AppError::bad_request("sendAt must be an RFC 3339 timestamp"))?
        .with_timezone(&Utc);
    if send_at <= Utc::now() {
        return Err(AppError::bad_request("sendAt must be in the future"));
    }

    let event = load_hosted_event(state.store.as_ref(), &event_id, &user.id).await?;

    let scheduled = state
        .store
        .create_scheduled_message(ScheduledMessage {
            id: Uuid::new_v4().to_string(),
            event_id: event.id.clone(),
            sender_user_id: user.id.clone(),
            content,
            send_at,
            status: ScheduledStatus::Scheduled,
            recipient_filter: request.recipient_filter.unwrap_or_default(),
            sent_count: 0,
            failed_count: 0,
            sent_at: None,
            created_at: Some(now_str()),
        })
        .await?;

    info!(
        "Scheduled message {} for event {} at {}",
        scheduled.id, event.id, scheduled.send_at
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "scheduledMessage": ScheduledMessageResponse::from(scheduled)
        })),
    ))
}
