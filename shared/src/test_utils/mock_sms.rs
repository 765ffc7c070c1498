use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::sms::{SmsError, SmsReceipt, SmsSender};

#[derive(Debug, Clone, PartialEq)]
pub struct SentSms {
    pub to: String,
    pub body: String,
    pub sid: String,
}

/// Records outgoing messages instead of calling the provider
#[derive(Default)]
pub struct MockSmsSender {
    sent: Mutex<Vec<SentSms>>,
    failing: Mutex<HashSet<String>>,
}

impl MockSmsSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send to `phone` fail with a provider error
    pub fn fail_for(&self, phone: &str) {
        self.failing.lock().unwrap().insert(phone.to_string());
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.to).collect()
    }
}

#[async_trait]
impl SmsSender for MockSmsSender {
    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError> {
        if self.failing.lock().unwrap().contains(to) {
            return Err(SmsError::Provider {
                code: Some(30006),
                message: "Landline or unreachable carrier".to_string(),
            });
        }

        let mut sent = self.sent.lock().unwrap();
        let sid = format!("SM{:032}", sent.len() + 1);
        sent.push(SentSms {
            to: to.to_string(),
            body: body.to_string(),
            sid: sid.clone(),
        });

        Ok(SmsReceipt {
            sid,
            status: "queued".to_string(),
        })
    }
}
