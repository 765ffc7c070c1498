use chrono::{SecondsFormat, Utc};

pub mod events;
pub mod messages;

pub use events::{AuthUser, Event, EventGuest, Media, MediaType, PublicUserProfile, RsvpStatus};
pub use messages::{
    DeliveryStatusUpdate, Message, MessageDelivery, MessageType, RecipientFilter,
    ScheduledMessage, ScheduledOutcome, ScheduledStatus,
};

/// Current UTC time as an RFC 3339 string, the format PostgREST accepts for timestamptz.
pub fn now_str() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
