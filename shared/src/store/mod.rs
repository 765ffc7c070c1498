use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    DeliveryStatusUpdate, Event, EventGuest, Media, Message, MessageDelivery, PublicUserProfile,
    RsvpStatus, ScheduledMessage, ScheduledOutcome,
};

pub mod supabase;

/// Upper bound on scheduled messages picked up by a single processing run
pub const SCHEDULED_BATCH_LIMIT: usize = 50;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP request to database failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to decode database response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Events, guests and media
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>>;

    /// Returns the event only when `host_id` owns it
    async fn get_hosted_event(&self, event_id: &str, host_id: &str) -> Result<Option<Event>>;

    async fn list_guests(&self, event_id: &str) -> Result<Vec<EventGuest>>;

    async fn get_guest_for_user(&self, event_id: &str, user_id: &str)
        -> Result<Option<EventGuest>>;

    async fn add_guest(&self, guest: EventGuest) -> Result<EventGuest>;

    async fn update_rsvp(&self, guest_id: &str, status: RsvpStatus) -> Result<EventGuest>;

    async fn list_media(&self, event_id: &str) -> Result<Vec<Media>>;

    async fn get_profiles(&self, user_ids: &[String]) -> Result<Vec<PublicUserProfile>>;
}

/// Messages, SMS deliveries and scheduled sends
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, message: Message) -> Result<Message>;

    async fn list_messages(&self, event_id: &str) -> Result<Vec<Message>>;

    async fn record_deliveries(&self, deliveries: Vec<MessageDelivery>) -> Result<()>;

    /// Applies a provider status callback. Returns the number of rows touched.
    async fn update_delivery_status(
        &self,
        sms_message_sid: &str,
        update: DeliveryStatusUpdate,
    ) -> Result<usize>;

    async fn create_scheduled_message(&self, scheduled: ScheduledMessage)
        -> Result<ScheduledMessage>;

    /// Scheduled messages whose send time has passed, oldest first
    async fn list_due_scheduled_messages(&self, now: DateTime<Utc>)
        -> Result<Vec<ScheduledMessage>>;

    /// Moves a message from `scheduled` to `sending`. Returns false if another
    /// run already claimed it.
    async fn claim_scheduled_message(&self, id: &str) -> Result<bool>;

    async fn complete_scheduled_message(&self, id: &str, outcome: ScheduledOutcome)
        -> Result<()>;
}

/// Everything the API needs from the backend
pub trait Store: EventStore + MessageStore {}

impl<T: EventStore + MessageStore> Store for T {}
