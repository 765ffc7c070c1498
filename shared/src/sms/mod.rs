use async_trait::async_trait;
use thiserror::Error;

pub mod fanout;
pub mod twilio;

pub use fanout::{announcement_body, reminder_body, send_to_guests, DeliveryOrigin, SmsBatchResult};
pub use twilio::TwilioSmsSender;

/// Maximum characters accepted for a host-authored message body
pub const MAX_MESSAGE_LENGTH: usize = 1500;

#[derive(Error, Debug)]
pub enum SmsError {
    #[error("HTTP request to SMS provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMS provider rejected message (code {code:?}): {message}")]
    Provider { code: Option<i64>, message: String },

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
}

impl SmsError {
    /// Provider error code as stored on the delivery row
    pub fn code(&self) -> Option<String> {
        match self {
            SmsError::Provider { code, .. } => code.map(|c| c.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmsReceipt {
    pub sid: String,
    pub status: String,
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError>;
}

/// Normalizes a user-entered phone number to E.164.
///
/// Ten-digit numbers are assumed to be North American. Numbers already carrying
/// a `+` keep their country code as long as they have 8 to 15 digits.
pub fn normalize_phone(raw: &str) -> Result<String, SmsError> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');

    let mut digits = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            '+' if i == 0 => {}
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(SmsError::InvalidPhone(raw.to_string())),
        }
    }

    if has_plus {
        if (8..=15).contains(&digits.len()) && !digits.starts_with('0') {
            return Ok(format!("+{}", digits));
        }
        return Err(SmsError::InvalidPhone(raw.to_string()));
    }

    match digits.len() {
        10 => Ok(format!("+1{}", digits)),
        11 if digits.starts_with('1') => Ok(format!("+{}", digits)),
        _ => Err(SmsError::InvalidPhone(raw.to_string())),
    }
}

/// Maps a Twilio `MessageStatus` onto the delivery states tracked in `message_deliveries`
pub fn map_provider_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "accepted" | "queued" | "scheduled" => "queued".to_string(),
        "sending" => "sending".to_string(),
        "sent" => "sent".to_string(),
        "delivered" | "read" => "delivered".to_string(),
        "undelivered" => "undelivered".to_string(),
        "failed" | "canceled" => "failed".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("(555) 123-4567").unwrap(), "+15551234567");
        assert_eq!(normalize_phone("1-555-123-4567").unwrap(), "+15551234567");
        assert_eq!(normalize_phone("+44 20 7946 0958").unwrap(), "+442079460958");
        assert_eq!(normalize_phone(" 555.123.4567 ").unwrap(), "+15551234567");

        assert!(normalize_phone("555-1234").is_err());
        assert!(normalize_phone("2-555-123-4567").is_err());
        assert!(normalize_phone("+1234").is_err());
        assert!(normalize_phone("555-123-456x").is_err());
        assert!(normalize_phone("").is_err());
    }

    #[test]
    fn test_map_provider_status() {
        assert_eq!(map_provider_status("accepted"), "queued");
        assert_eq!(map_provider_status("Delivered"), "delivered");
        assert_eq!(map_provider_status("read"), "delivered");
        assert_eq!(map_provider_status("canceled"), "failed");
        assert_eq!(map_provider_status("undelivered"), "undelivered");
        assert_eq!(map_provider_status("receiving"), "receiving");
    }
}
