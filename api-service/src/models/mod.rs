use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unveil_shared::models::{
    EventGuest, Media, MediaType, Message, MessageType, PublicUserProfile, RecipientFilter,
    RsvpStatus, ScheduledMessage, ScheduledStatus,
};

// Request DTOs
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendAnnouncementRequest {
    pub event_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendReminderRequest {
    pub event_id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddGuestRequest {
    pub guest_name: Option<String>,
    pub phone: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateRsvpRequest {
    pub status: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<MessageType>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMessageRequest {
    pub content: Option<String>,
    pub send_at: Option<String>,
    #[serde(default)]
    pub recipient_filter: Option<RecipientFilter>,
}

// Response DTOs
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SmsSendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub sent: u32,
    pub failed: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GuestResponse {
    pub id: String,
    pub event_id: String,
    pub user_id: Option<String>,
    pub guest_name: Option<String>,
    pub phone: Option<String>,
    pub rsvp_status: RsvpStatus,
    pub sms_opt_out: bool,
    pub created_at: Option<String>,
}

impl From<EventGuest> for GuestResponse {
    fn from(guest: EventGuest) -> Self {
        Self {
            id: guest.id,
            event_id: guest.event_id,
            user_id: guest.user_id,
            guest_name: guest.guest_name,
            phone: guest.phone,
            rsvp_status: guest.rsvp_status,
            sms_opt_out: guest.sms_opt_out,
            created_at: guest.created_at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub event_id: String,
    pub sender_user_id: String,
    pub sender_name: Option<String>,
    pub sender_avatar_url: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: Option<String>,
}

impl MessageResponse {
    pub fn with_sender(message: Message, profiles: &HashMap<String, PublicUserProfile>) -> Self {
        let profile = profiles.get(&message.sender_user_id);
        Self {
            sender_name: profile.and_then(|p| p.full_name.clone()),
            sender_avatar_url: profile.and_then(|p| p.avatar_url.clone()),
            id: message.id,
            event_id: message.event_id,
            sender_user_id: message.sender_user_id,
            content: message.content,
            message_type: message.message_type,
            created_at: message.created_at,
        }
    }
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self::with_sender(message, &HashMap::new())
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MediaResponse {
    pub id: String,
    pub event_id: String,
    pub uploader_user_id: String,
    pub storage_path: String,
    pub media_type: MediaType,
    pub caption: Option<String>,
    pub created_at: Option<String>,
}

impl From<Media> for MediaResponse {
    fn from(media: Media) -> Self {
        Self {
            id: media.id,
            event_id: media.event_id,
            uploader_user_id: media.uploader_user_id,
            storage_path: media.storage_path,
            media_type: media.media_type,
            caption: media.caption,
            created_at: media.created_at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessageResponse {
    pub id: String,
    pub event_id: String,
    pub content: String,
    pub send_at: String,
    pub status: ScheduledStatus,
    pub recipient_filter: RecipientFilter,
    pub sent_count: u32,
    pub failed_count: u32,
    pub sent_at: Option<String>,
}

impl From<ScheduledMessage> for ScheduledMessageResponse {
    fn from(scheduled: ScheduledMessage) -> Self {
        Self {
            id: scheduled.id,
            event_id: scheduled.event_id,
            content: scheduled.content,
            send_at: scheduled.send_at.to_rfc3339(),
            status: scheduled.status,
            recipient_filter: scheduled.recipient_filter,
            sent_count: scheduled.sent_count,
            failed_count: scheduled.failed_count,
            sent_at: scheduled.sent_at,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ProcessingError {
    pub id: String,
    pub error: String,
}

/// Summary returned by the scheduled-message processor and relayed by the cron route
#[derive(Serialize, Debug)]
pub struct ProcessingSummary {
    pub success: bool,
    pub processed: u32,
    pub sent: u32,
    pub failed: u32,
    pub errors: Vec<ProcessingError>,
}

impl Default for ProcessingSummary {
    fn default() -> Self {
        Self {
            success: true,
            processed: 0,
            sent: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }
}
