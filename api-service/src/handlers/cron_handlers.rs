use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use log::{debug, error, info};
use unveil_shared::error::{AppError, Result};
use unveil_shared::models::{now_str, ScheduledMessage, ScheduledOutcome, ScheduledStatus};
use unveil_shared::sms::{announcement_body, send_to_guests, DeliveryOrigin, SmsBatchResult};
use unveil_shared::store::{EventStore, MessageStore};

use super::require_cron_secret;
use crate::models::{ProcessingError, ProcessingSummary};
use crate::state::AppState;

// GET|POST /api/cron/process-messages
// Relays the cron tick to the scheduled-message processor and hands back its JSON untouched.
pub async fn process_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let secret = require_cron_secret(&state, &headers)?;

    info!("Cron trigger received, forwarding to {}", state.processor_url);

    let response = state
        .http
        .post(&state.processor_url)
        .bearer_auth(secret)
        .send()
        .await
        .map_err(|e| {
            AppError::internal_server_error(format!("Failed to reach message processor: {}", e))
        })?;

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json().await.map_err(|e| {
        AppError::internal_server_error(format!("Message processor returned invalid JSON: {}", e))
    })?;

    info!("Message processor responded with {}", status);
    Ok((status, Json(body)).into_response())
}

// POST /api/messages/process-scheduled
pub async fn process_scheduled(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProcessingSummary>> {
    require_cron_secret(&state, &headers)?;

    let due = state
        .store
        .list_due_scheduled_messages(Utc::now())
        .await?;
    info!("Found {} scheduled messages due for sending", due.len());

    let mut summary = ProcessingSummary::default();

    for scheduled in &due {
        match dispatch_scheduled(&state, scheduled).await {
            Ok(Some(dispatched)) => {
                summary.processed += 1;
                summary.sent += dispatched.result.sent;
                summary.failed += dispatched.result.failed;
                if let Some(error) = dispatched.completion_error {
                    summary.errors.push(ProcessingError {
                        id: scheduled.id.clone(),
                        error,
                    });
                }
            }
            Ok(None) => {
                debug!(
                    "Scheduled message {} was claimed by another run",
                    scheduled.id
                );
            }
            Err(e) => {
                error!("Failed to process scheduled message {}: {}", scheduled.id, e);
                summary.errors.push(ProcessingError {
                    id: scheduled.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Scheduled processing completed: processed={}, sent={}, failed={}, errors={}",
        summary.processed,
        summary.sent,
        summary.failed,
        summary.errors.len()
    );

    Ok(Json(summary))
}

/// A scheduled message that went out. `completion_error` is set when the
/// final status could not be written; the row is then left in `sending`.
struct Dispatched {
    result: SmsBatchResult,
    completion_error: Option<String>,
}

/// Claims and sends one scheduled message. Returns `None` when another run got
/// there first.
async fn dispatch_scheduled(
    state: &AppState,
    scheduled: &ScheduledMessage,
) -> Result<Option<Dispatched>> {
    if !state.store.claim_scheduled_message(&scheduled.id).await? {
        return Ok(None);
    }

    match send_claimed(state, scheduled).await {
        Ok(result) => {
            let status = if result.sent == 0 && result.failed > 0 {
                ScheduledStatus::Failed
            } else {
                ScheduledStatus::Sent
            };
            let completion_error = state
                .store
                .complete_scheduled_message(
                    &scheduled.id,
                    ScheduledOutcome {
                        status,
                        sent_count: result.sent,
                        failed_count: result.failed,
                        sent_at: now_str(),
                    },
                )
                .await
                .err()
                .map(|e| {
                    error!(
                        "Sent scheduled message {} but failed to record completion: {}",
                        scheduled.id, e
                    );
                    format!("Failed to record completion: {}", e)
                });
            Ok(Some(Dispatched {
                result,
                completion_error,
            }))
        }
        Err(e) => {
            // Release the claim as failed
            if let Err(mark_err) = state
                .store
                .complete_scheduled_message(
                    &scheduled.id,
                    ScheduledOutcome {
                        status: ScheduledStatus::Failed,
                        sent_count: 0,
                        failed_count: 0,
                        sent_at: now_str(),
                    },
                )
                .await
            {
                error!(
                    "Failed to mark scheduled message {} as failed: {}",
                    scheduled.id, mark_err
                );
            }
            Err(e)
        }
    }
}

async fn send_claimed(state: &AppState, scheduled: &ScheduledMessage) -> Result<SmsBatchResult> {
    let event = state
        .store
        .get_event(&scheduled.event_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Event {} not found", scheduled.event_id)))?;

    let recipients: Vec<_> = state
        .store
        .list_guests(&event.id)
        .await?
        .into_iter()
        .filter(|g| scheduled.recipient_filter.matches(g.rsvp_status))
        .collect();

    info!(
        "Dispatching scheduled message {} for event {} to {} recipients",
        scheduled.id,
        event.id,
        recipients.len()
    );

    Ok(send_to_guests(
        state.store.as_ref(),
        state.sms.as_ref(),
        &recipients,
        &announcement_body(&event, &scheduled.content),
        &DeliveryOrigin::Scheduled(scheduled.id.clone()),
    )
    .await)
}
