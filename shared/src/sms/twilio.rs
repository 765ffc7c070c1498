use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use log::{error, info};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;

use super::{SmsError, SmsReceipt, SmsSender};
use crate::config::{SmsFrom, TwilioConfig};

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Sends SMS through the Twilio Messages REST API
#[derive(Clone)]
pub struct TwilioSmsSender {
    client: Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from: SmsFrom,
    status_callback_url: Option<String>,
}

impl TwilioSmsSender {
    pub fn new(client: Client, config: &TwilioConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.clone(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: config.from.clone(),
            status_callback_url: config.status_callback_url.clone(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError> {
        let mut form: Vec<(&str, &str)> = vec![("To", to), ("Body", body)];
        match &self.from {
            SmsFrom::MessagingService(sid) => form.push(("MessagingServiceSid", sid.as_str())),
            SmsFrom::PhoneNumber(number) => form.push(("From", number.as_str())),
        }
        if let Some(callback) = &self.status_callback_url {
            form.push(("StatusCallback", callback.as_str()));
        }

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach Twilio: {}", e);
                SmsError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let parsed: Option<TwilioErrorResponse> = serde_json::from_str(&error_text).ok();
            let (code, message) = match parsed {
                Some(err) => (err.code, err.message.unwrap_or_else(|| error_text.clone())),
                None => (None, error_text),
            };
            error!(
                "Twilio returned error status {} (code {:?}): {}",
                status, code, message
            );
            return Err(SmsError::Provider { code, message });
        }

        let message: TwilioMessageResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Twilio response: {}", e);
            SmsError::Provider {
                code: None,
                message: format!("Failed to parse Twilio response: {}", e),
            }
        })?;

        info!("Twilio accepted message {}", message.sid);

        Ok(SmsReceipt {
            sid: message.sid,
            status: message.status.unwrap_or_else(|| "queued".to_string()),
        })
    }
}

/// Computes the `X-Twilio-Signature` value for a form-encoded callback: the full
/// callback URL followed by every parameter name and value sorted by name, signed
/// with HMAC-SHA1 using the account auth token.
pub fn compute_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
) -> Option<String> {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut payload = String::from(url);
    for (key, value) in sorted {
        payload.push_str(key);
        payload.push_str(value);
    }

    let mut mac = Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn validate_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature: &str,
) -> bool {
    match compute_signature(auth_token, url, params) {
        Some(expected) => crate::auth::constant_time_eq(expected.as_bytes(), signature.as_bytes()),
        None => false,
    }
}
