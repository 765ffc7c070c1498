use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RsvpStatus;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Channel,
    Announcement,
    Direct,
}

/// A message posted to an event's feed
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub event_id: String,
    pub sender_user_id: String,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One SMS attempt to one guest. `sms_message_sid` is the provider's id and the
/// key status callbacks are matched on.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MessageDelivery {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_message_id: Option<String>,
    pub guest_id: String,
    pub phone: String,
    #[serde(default)]
    pub sms_message_sid: Option<String>,
    pub sms_status: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Partial update written when the SMS provider reports a status change
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DeliveryStatusUpdate {
    pub sms_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub updated_at: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScheduledStatus {
    #[default]
    Scheduled,
    Sending,
    Sent,
    Failed,
    Cancelled,
}

/// Which guests a scheduled message goes to, by RSVP status
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecipientFilter {
    #[default]
    All,
    Pending,
    Attending,
    Declined,
    Maybe,
}

impl RecipientFilter {
    pub fn matches(&self, status: RsvpStatus) -> bool {
        match self {
            RecipientFilter::All => true,
            RecipientFilter::Pending => status == RsvpStatus::Pending,
            RecipientFilter::Attending => status == RsvpStatus::Attending,
            RecipientFilter::Declined => status == RsvpStatus::Declined,
            RecipientFilter::Maybe => status == RsvpStatus::Maybe,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ScheduledMessage {
    pub id: String,
    pub event_id: String,
    pub sender_user_id: String,
    pub content: String,
    pub send_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ScheduledStatus,
    #[serde(default)]
    pub recipient_filter: RecipientFilter,
    #[serde(default)]
    pub sent_count: u32,
    #[serde(default)]
    pub failed_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Final state written once a scheduled message has been dispatched
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScheduledOutcome {
    pub status: ScheduledStatus,
    pub sent_count: u32,
    pub failed_count: u32,
    pub sent_at: String,
}
