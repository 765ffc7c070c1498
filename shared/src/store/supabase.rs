use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, error};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{EventStore, MessageStore, Result, StoreError, SCHEDULED_BATCH_LIMIT};
use crate::models::{
    now_str, DeliveryStatusUpdate, Event, EventGuest, Media, Message, MessageDelivery,
    PublicUserProfile, RsvpStatus, ScheduledMessage, ScheduledOutcome, ScheduledStatus,
};

const EVENTS_TABLE: &str = "events";
const GUESTS_TABLE: &str = "event_guests";
const MEDIA_TABLE: &str = "media";
const PROFILES_TABLE: &str = "public_user_profiles";
const MESSAGES_TABLE: &str = "messages";
const DELIVERIES_TABLE: &str = "message_deliveries";
const SCHEDULED_TABLE: &str = "scheduled_messages";

/// PostgREST-backed store using the service-role key
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    rest_url: String,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(client: Client, supabase_url: &str, service_key: &str) -> Self {
        Self {
            client,
            rest_url: format!("{}/rest/v1", supabase_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn eq(value: &str) -> String {
        format!("eq.{}", value)
    }

    async fn rows<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Vec<T>> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("PostgREST returned error status {}: {}", status, body);
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn first<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Option<T>> {
        Ok(Self::rows(builder.query(&[("limit", "1")]))
            .await?
            .into_iter()
            .next())
    }

    async fn insert_one<T: DeserializeOwned>(
        &self,
        table: &str,
        body: serde_json::Value,
        what: &str,
    ) -> Result<T> {
        let builder = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&body);

        Self::rows(builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("Insert into {} returned no {}", table, what)))
    }
}

#[async_trait]
impl EventStore for SupabaseStore {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        Self::first(
            self.request(Method::GET, EVENTS_TABLE)
                .query(&[("select", "*"), ("id", Self::eq(event_id).as_str())]),
        )
        .await
    }

    async fn get_hosted_event(&self, event_id: &str, host_id: &str) -> Result<Option<Event>> {
        debug!("Checking host {} owns event {}", host_id, event_id);
        Self::first(self.request(Method::GET, EVENTS_TABLE).query(&[
            ("select", "*"),
            ("id", Self::eq(event_id).as_str()),
            ("host_user_id", Self::eq(host_id).as_str()),
        ]))
        .await
    }

    async fn list_guests(&self, event_id: &str) -> Result<Vec<EventGuest>> {
        Self::rows(self.request(Method::GET, GUESTS_TABLE).query(&[
            ("select", "*"),
            ("event_id", Self::eq(event_id).as_str()),
            ("order", "created_at.asc"),
        ]))
        .await
    }

    async fn get_guest_for_user(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<EventGuest>> {
        Self::first(self.request(Method::GET, GUESTS_TABLE).query(&[
            ("select", "*"),
            ("event_id", Self::eq(event_id).as_str()),
            ("user_id", Self::eq(user_id).as_str()),
        ]))
        .await
    }

    async fn add_guest(&self, guest: EventGuest) -> Result<EventGuest> {
        let body = serde_json::to_value(&guest).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.insert_one(GUESTS_TABLE, body, "guest").await
    }

    async fn update_rsvp(&self, guest_id: &str, status: RsvpStatus) -> Result<EventGuest> {
        let builder = self
            .request(Method::PATCH, GUESTS_TABLE)
            .query(&[("id", Self::eq(guest_id))])
            .header("Prefer", "return=representation")
            .json(&json!({ "rsvp_status": status }));

        Self::rows(builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound("Guest".into()))
    }

    async fn list_media(&self, event_id: &str) -> Result<Vec<Media>> {
        Self::rows(self.request(Method::GET, MEDIA_TABLE).query(&[
            ("select", "*"),
            ("event_id", Self::eq(event_id).as_str()),
            ("order", "created_at.desc"),
        ]))
        .await
    }

    async fn get_profiles(&self, user_ids: &[String]) -> Result<Vec<PublicUserProfile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = format!("in.({})", user_ids.join(","));
        Self::rows(
            self.request(Method::GET, PROFILES_TABLE)
                .query(&[("select", "id,full_name,avatar_url"), ("id", ids.as_str())]),
        )
        .await
    }
}

#[async_trait]
impl MessageStore for SupabaseStore {
    async fn create_message(&self, message: Message) -> Result<Message> {
        let body =
            serde_json::to_value(&message).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.insert_one(MESSAGES_TABLE, body, "message").await
    }

    async fn list_messages(&self, event_id: &str) -> Result<Vec<Message>> {
        Self::rows(self.request(Method::GET, MESSAGES_TABLE).query(&[
            ("select", "*"),
            ("event_id", Self::eq(event_id).as_str()),
            ("order", "created_at.asc"),
        ]))
        .await
    }

    async fn record_deliveries(&self, deliveries: Vec<MessageDelivery>) -> Result<()> {
        if deliveries.is_empty() {
            return Ok(());
        }

        let response = self
            .request(Method::POST, DELIVERIES_TABLE)
            .header("Prefer", "return=minimal")
            .json(&deliveries)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Failed to record {} deliveries: {} {}", deliveries.len(), status, body);
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn update_delivery_status(
        &self,
        sms_message_sid: &str,
        update: DeliveryStatusUpdate,
    ) -> Result<usize> {
        let builder = self
            .request(Method::PATCH, DELIVERIES_TABLE)
            .query(&[("sms_message_sid", Self::eq(sms_message_sid))])
            .header("Prefer", "return=representation")
            .json(&update);

        let rows: Vec<serde_json::Value> = Self::rows(builder).await?;
        Ok(rows.len())
    }

    async fn create_scheduled_message(
        &self,
        scheduled: ScheduledMessage,
    ) -> Result<ScheduledMessage> {
        let body =
            serde_json::to_value(&scheduled).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.insert_one(SCHEDULED_TABLE, body, "scheduled message")
            .await
    }

    async fn list_due_scheduled_messages(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledMessage>> {
        let cutoff = format!("lte.{}", now.to_rfc3339_opts(SecondsFormat::Secs, true));
        let limit = SCHEDULED_BATCH_LIMIT.to_string();

        Self::rows(self.request(Method::GET, SCHEDULED_TABLE).query(&[
            ("select", "*"),
            ("status", "eq.scheduled"),
            ("send_at", cutoff.as_str()),
            ("order", "send_at.asc"),
            ("limit", limit.as_str()),
        ]))
        .await
    }

    async fn claim_scheduled_message(&self, id: &str) -> Result<bool> {
        let builder = self
            .request(Method::PATCH, SCHEDULED_TABLE)
            .query(&[("id", Self::eq(id)), ("status", "eq.scheduled".to_string())])
            .header("Prefer", "return=representation")
            .json(&json!({ "status": ScheduledStatus::Sending }));

        let rows: Vec<serde_json::Value> = Self::rows(builder).await?;
        Ok(!rows.is_empty())
    }

    async fn complete_scheduled_message(&self, id: &str, outcome: ScheduledOutcome) -> Result<()> {
        let builder = self
            .request(Method::PATCH, SCHEDULED_TABLE)
            .query(&[("id", Self::eq(id))])
            .header("Prefer", "return=representation")
            .json(&outcome);

        let rows: Vec<serde_json::Value> = Self::rows(builder).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("Scheduled message {}", id)));
        }

        debug!("Scheduled message {} completed at {}", id, now_str());
        Ok(())
    }
}
