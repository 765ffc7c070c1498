use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    now_str, DeliveryStatusUpdate, Event, EventGuest, Media, Message, MessageDelivery,
    PublicUserProfile, RsvpStatus, ScheduledMessage, ScheduledOutcome, ScheduledStatus,
};
use crate::store::{EventStore, MessageStore, Result, StoreError, SCHEDULED_BATCH_LIMIT};

/// In-memory store for handler tests
#[derive(Default)]
pub struct MockStore {
    events: Mutex<Vec<Event>>,
    guests: Mutex<Vec<EventGuest>>,
    media: Mutex<Vec<Media>>,
    profiles: Mutex<Vec<PublicUserProfile>>,
    messages: Mutex<Vec<Message>>,
    deliveries: Mutex<Vec<MessageDelivery>>,
    scheduled: Mutex<Vec<ScheduledMessage>>,
    fail_delivery_writes: AtomicBool,
    fail_delivery_updates: AtomicBool,
    fail_event_reads: AtomicBool,
    fail_scheduled_completion: AtomicBool,
}

fn unavailable() -> StoreError {
    StoreError::Api {
        status: 503,
        body: "mock store unavailable".to_string(),
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_event(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn insert_guest(&self, guest: EventGuest) {
        self.guests.lock().unwrap().push(guest);
    }

    pub fn insert_media(&self, media: Media) {
        self.media.lock().unwrap().push(media);
    }

    pub fn insert_profile(&self, profile: PublicUserProfile) {
        self.profiles.lock().unwrap().push(profile);
    }

    pub fn insert_message(&self, message: Message) {
        self.messages.lock().unwrap().push(message);
    }

    pub fn insert_delivery(&self, delivery: MessageDelivery) {
        self.deliveries.lock().unwrap().push(delivery);
    }

    pub fn insert_scheduled(&self, scheduled: ScheduledMessage) {
        self.scheduled.lock().unwrap().push(scheduled);
    }

    pub fn guests(&self) -> Vec<EventGuest> {
        self.guests.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn deliveries(&self) -> Vec<MessageDelivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn scheduled(&self, id: &str) -> Option<ScheduledMessage> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub fn fail_delivery_writes(&self, fail: bool) {
        self.fail_delivery_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delivery_updates(&self, fail: bool) {
        self.fail_delivery_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_event_reads(&self, fail: bool) {
        self.fail_event_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_scheduled_completion(&self, fail: bool) {
        self.fail_scheduled_completion.store(fail, Ordering::SeqCst);
    }

    fn check_event_reads(&self) -> Result<()> {
        if self.fail_event_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MockStore {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        self.check_event_reads()?;
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == event_id)
            .cloned())
    }

    async fn get_hosted_event(&self, event_id: &str, host_id: &str) -> Result<Option<Event>> {
        self.check_event_reads()?;
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == event_id && e.host_user_id == host_id)
            .cloned())
    }

    async fn list_guests(&self, event_id: &str) -> Result<Vec<EventGuest>> {
        Ok(self
            .guests
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn get_guest_for_user(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<EventGuest>> {
        Ok(self
            .guests
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.event_id == event_id && g.user_id.as_deref() == Some(user_id))
            .cloned())
    }

    async fn add_guest(&self, mut guest: EventGuest) -> Result<EventGuest> {
        guest.created_at.get_or_insert_with(now_str);
        self.guests.lock().unwrap().push(guest.clone());
        Ok(guest)
    }

    async fn update_rsvp(&self, guest_id: &str, status: RsvpStatus) -> Result<EventGuest> {
        let mut guests = self.guests.lock().unwrap();
        let guest = guests
            .iter_mut()
            .find(|g| g.id == guest_id)
            .ok_or_else(|| StoreError::NotFound("Guest".into()))?;
        guest.rsvp_status = status;
        Ok(guest.clone())
    }

    async fn list_media(&self, event_id: &str) -> Result<Vec<Media>> {
        Ok(self
            .media
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn get_profiles(&self, user_ids: &[String]) -> Result<Vec<PublicUserProfile>> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .filter(|p| user_ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageStore for MockStore {
    async fn create_message(&self, mut message: Message) -> Result<Message> {
        message.created_at.get_or_insert_with(now_str);
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, event_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn record_deliveries(&self, deliveries: Vec<MessageDelivery>) -> Result<()> {
        if self.fail_delivery_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.deliveries.lock().unwrap().extend(deliveries);
        Ok(())
    }

    async fn update_delivery_status(
        &self,
        sms_message_sid: &str,
        update: DeliveryStatusUpdate,
    ) -> Result<usize> {
        if self.fail_delivery_updates.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let mut updated = 0;
        for delivery in self.deliveries.lock().unwrap().iter_mut() {
            if delivery.sms_message_sid.as_deref() == Some(sms_message_sid) {
                delivery.sms_status = update.sms_status.clone();
                delivery.error_code = update.error_code.clone();
                delivery.error_message = update.error_message.clone();
                delivery.updated_at = Some(update.updated_at.clone());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn create_scheduled_message(
        &self,
        mut scheduled: ScheduledMessage,
    ) -> Result<ScheduledMessage> {
        scheduled.created_at.get_or_insert_with(now_str);
        self.scheduled.lock().unwrap().push(scheduled.clone());
        Ok(scheduled)
    }

    async fn list_due_scheduled_messages(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledMessage>> {
        let mut due: Vec<ScheduledMessage> = self
            .scheduled
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.status == ScheduledStatus::Scheduled && s.send_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|s| s.send_at);
        due.truncate(SCHEDULED_BATCH_LIMIT);
        Ok(due)
    }

    async fn claim_scheduled_message(&self, id: &str) -> Result<bool> {
        let mut scheduled = self.scheduled.lock().unwrap();
        match scheduled
            .iter_mut()
            .find(|s| s.id == id && s.status == ScheduledStatus::Scheduled)
        {
            Some(s) => {
                s.status = ScheduledStatus::Sending;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete_scheduled_message(&self, id: &str, outcome: ScheduledOutcome) -> Result<()> {
        if self.fail_scheduled_completion.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut scheduled = self.scheduled.lock().unwrap();
        let s = scheduled
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Scheduled message {}", id)))?;
        s.status = outcome.status;
        s.sent_count = outcome.sent_count;
        s.failed_count = outcome.failed_count;
        s.sent_at = Some(outcome.sent_at);
        Ok(())
    }
}
