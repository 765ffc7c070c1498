use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use log::info;
use unveil_shared::error::{AppError, Result};
use unveil_shared::models::{now_str, AuthUser, EventGuest, RsvpStatus};
use unveil_shared::sms::normalize_phone;
use unveil_shared::store::EventStore;
use uuid::Uuid;

use super::{load_hosted_event, load_member_event, parse_event_id, parse_json};
use crate::models::{AddGuestRequest, GuestResponse, MediaResponse, UpdateRsvpRequest};
use crate::state::AppState;

// GET /api/events/:id/guests
pub async fn list_guests(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>> {
    let event = load_hosted_event(state.store.as_ref(), &event_id, &user.id).await?;

    let guests: Vec<GuestResponse> = state
        .store
        .list_guests(&event.id)
        .await?
        .into_iter()
        .map(GuestResponse::from)
        .collect();

    Ok(Json(serde_json::json!({ "guests": guests })))
}

// POST /api/events/:id/guests
pub async fn add_guest(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<AddGuestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let request = parse_json(payload)?;

    let guest_name = request
        .guest_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let phone = match request.phone.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            normalize_phone(raw).map_err(|e| AppError::bad_request(e.to_string()))?,
        ),
        _ => None,
    };
    let user_id = request.user_id.filter(|u| !u.trim().is_empty());

    if guest_name.is_none() && phone.is_none() && user_id.is_none() {
        return Err(AppError::bad_request(
            "A guest needs at least a name, phone number or user id",
        ));
    }

    let event = load_hosted_event(state.store.as_ref(), &event_id, &user.id).await?;

    let guest = state
        .store
        .add_guest(EventGuest {
            id: Uuid::new_v4().to_string(),
            event_id: event.id.clone(),
            user_id,
            guest_name,
            phone,
            rsvp_status: RsvpStatus::Pending,
            sms_opt_out: false,
            created_at: Some(now_str()),
        })
        .await?;

    info!("Host {} added guest {} to event {}", user.id, guest.id, event.id);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "guest": GuestResponse::from(guest) })),
    ))
}

// PATCH /api/events/:id/rsvp
pub async fn update_rsvp(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<UpdateRsvpRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>> {
    let request = parse_json(payload)?;
    let status: RsvpStatus = request.status.parse().map_err(AppError::bad_request)?;
    let event_id = parse_event_id(&event_id)?;

    let guest = state
        .store
        .get_guest_for_user(&event_id, &user.id)
        .await?
        .ok_or_else(|| AppError::not_found("You are not a guest of this event"))?;

    let updated = state.store.update_rsvp(&guest.id, status).await?;

    info!(
        "Guest {} set RSVP for event {} to {}",
        updated.id, event_id, status
    );

    Ok(Json(
        serde_json::json!({ "guest": GuestResponse::from(updated) }),
    ))
}

// GET /api/events/:id/media
pub async fn list_media(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>> {
    let (event, _) = load_member_event(state.store.as_ref(), &event_id, &user.id).await?;

    let media: Vec<MediaResponse> = state
        .store
        .list_media(&event.id)
        .await?
        .into_iter()
        .map(MediaResponse::from)
        .collect();

    Ok(Json(serde_json::json!({ "media": media })))
}
