use std::collections::HashSet;

use log::{error, info, warn};
use serde::Serialize;
use uuid::Uuid;

use super::{map_provider_status, normalize_phone, SmsSender};
use crate::models::{now_str, Event, EventGuest, MessageDelivery};
use crate::store::MessageStore;

/// What a batch of deliveries is attached to
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOrigin {
    Message(String),
    Scheduled(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SmsBatchResult {
    pub sent: u32,
    pub failed: u32,
}

pub fn announcement_body(event: &Event, message: &str) -> String {
    format!("{}: {}", event.title, message.trim())
}

pub fn reminder_body(event: &Event) -> String {
    let date = event.event_date.format("%B %-d, %Y");
    match event.location.as_deref().filter(|l| !l.trim().is_empty()) {
        Some(location) => format!(
            "Reminder: please RSVP for {} on {} at {}.",
            event.title, date, location
        ),
        None => format!("Reminder: please RSVP for {} on {}.", event.title, date),
    }
}

/// Sends `body` to every reachable guest and records one delivery row per attempt.
///
/// Guests who opted out or have no usable phone are skipped and counted in neither
/// total. Duplicate numbers receive a single message. A failed recipient never
/// aborts the rest of the batch.
pub async fn send_to_guests<S>(
    store: &S,
    sms: &dyn SmsSender,
    guests: &[EventGuest],
    body: &str,
    origin: &DeliveryOrigin,
) -> SmsBatchResult
where
    S: MessageStore + ?Sized,
{
    let mut result = SmsBatchResult::default();
    let mut seen = HashSet::new();
    let mut deliveries = Vec::new();

    for guest in guests {
        if guest.sms_opt_out {
            continue;
        }

        let phone = match guest.phone.as_deref().map(normalize_phone) {
            Some(Ok(phone)) => phone,
            Some(Err(e)) => {
                warn!("Skipping guest {}: {}", guest.id, e);
                continue;
            }
            None => continue,
        };

        if !seen.insert(phone.clone()) {
            continue;
        }

        let mut delivery = MessageDelivery {
            id: Uuid::new_v4().to_string(),
            message_id: None,
            scheduled_message_id: None,
            guest_id: guest.id.clone(),
            phone: phone.clone(),
            sms_message_sid: None,
            sms_status: "failed".to_string(),
            error_code: None,
            error_message: None,
            created_at: Some(now_str()),
            updated_at: None,
        };
        match origin {
            DeliveryOrigin::Message(id) => delivery.message_id = Some(id.clone()),
            DeliveryOrigin::Scheduled(id) => delivery.scheduled_message_id = Some(id.clone()),
        }

        match sms.send(&phone, body).await {
            Ok(receipt) => {
                result.sent += 1;
                delivery.sms_status = map_provider_status(&receipt.status);
                delivery.sms_message_sid = Some(receipt.sid);
            }
            Err(e) => {
                error!("Failed to send SMS to guest {}: {}", guest.id, e);
                result.failed += 1;
                delivery.error_code = e.code();
                delivery.error_message = Some(e.to_string());
            }
        }

        deliveries.push(delivery);
    }

    info!(
        "SMS batch for {:?} finished: sent={}, failed={}",
        origin, result.sent, result.failed
    );

    if let Err(e) = store.record_deliveries(deliveries).await {
        error!("Failed to record deliveries for {:?}: {}", origin, e);
    }

    result
}
