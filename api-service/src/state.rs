use std::sync::Arc;

use reqwest::Client;
use unveil_shared::auth::{AuthVerifier, SupabaseAuthVerifier};
use unveil_shared::config::Config;
use unveil_shared::sms::{SmsSender, TwilioSmsSender};
use unveil_shared::store::{supabase::SupabaseStore, Store};

/// Credentials needed to check `X-Twilio-Signature` on status callbacks
#[derive(Clone, Debug)]
pub struct TwilioWebhookAuth {
    pub auth_token: String,
    pub callback_url: String,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: Arc<dyn AuthVerifier>,
    pub sms: Arc<dyn SmsSender>,
    pub http: Client,
    pub cron_secret: Option<String>,
    pub processor_url: String,
    pub twilio_webhook: Option<TwilioWebhookAuth>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let http = Client::new();

        let store = SupabaseStore::new(
            http.clone(),
            &config.supabase.url,
            &config.supabase.service_role_key,
        );
        let auth = SupabaseAuthVerifier::new(http.clone(), &config.supabase);
        let sms = TwilioSmsSender::new(http.clone(), &config.twilio);

        let twilio_webhook =
            config
                .twilio
                .status_callback_url
                .as_ref()
                .map(|url| TwilioWebhookAuth {
                    auth_token: config.twilio.auth_token.clone(),
                    callback_url: url.clone(),
                });

        Self {
            store: Arc::new(store),
            auth: Arc::new(auth),
            sms: Arc::new(sms),
            http,
            cron_secret: config.cron_secret.clone(),
            processor_url: config.processor_url(),
            twilio_webhook,
        }
    }
}
