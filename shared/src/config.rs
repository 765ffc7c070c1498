use std::env;

use thiserror::Error;

const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Either TWILIO_PHONE_NUMBER or TWILIO_MESSAGING_SERVICE_SID must be set")]
    MissingSmsSender,

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Where outbound SMS originate from. A messaging service takes precedence
/// over a bare phone number when both are configured.
#[derive(Debug, Clone, PartialEq)]
pub enum SmsFrom {
    PhoneNumber(String),
    MessagingService(String),
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: String,
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub api_base: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from: SmsFrom,
    pub status_callback_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    pub cron_secret: Option<String>,
    pub supabase: SupabaseConfig,
    pub twilio: TwilioConfig,
}

impl Config {
    /// Loads configuration from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => 3000,
        };
        let app_base_url = get("APP_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let supabase = SupabaseConfig {
            url: require("NEXT_PUBLIC_SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            anon_key: require("NEXT_PUBLIC_SUPABASE_ANON_KEY")?,
            service_role_key: require("SUPABASE_SERVICE_ROLE_KEY")?,
            jwt_secret: get("SUPABASE_JWT_SECRET"),
        };

        let from = match (
            get("TWILIO_MESSAGING_SERVICE_SID"),
            get("TWILIO_PHONE_NUMBER"),
        ) {
            (Some(sid), _) => SmsFrom::MessagingService(sid),
            (None, Some(number)) => SmsFrom::PhoneNumber(number),
            (None, None) => return Err(ConfigError::MissingSmsSender),
        };

        let twilio = TwilioConfig {
            api_base: get("TWILIO_API_BASE")
                .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.into())
                .trim_end_matches('/')
                .to_string(),
            account_sid: require("TWILIO_ACCOUNT_SID")?,
            auth_token: require("TWILIO_AUTH_TOKEN")?,
            from,
            status_callback_url: get("TWILIO_STATUS_CALLBACK_URL"),
        };

        Ok(Config {
            host,
            port,
            app_base_url,
            cron_secret: get("CRON_SECRET"),
            supabase,
            twilio,
        })
    }

    /// URL of the scheduled-message processor the cron route relays to
    pub fn processor_url(&self) -> String {
        format!("{}/api/messages/process-scheduled", self.app_base_url)
    }
}
