//! Dispatcher doubles shared by the reminder tests.

use super::dispatcher::{DeliveryError, NotificationDispatcher, SmsMessage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Records every dispatched message; optionally fails each send after recording it
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<SmsMessage>>>,
    notify: Arc<Notify>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until at least `count` messages have been dispatched
    pub async fn wait_for(&self, count: usize) -> Vec<SmsMessage> {
        loop {
            let notified = self.notify.notified();
            {
                let sent = self.sent.lock().unwrap();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, message: &SmsMessage) -> Result<String, DeliveryError> {
        let id = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(message.clone());
            format!("test-{}", sent.len())
        };
        self.notify.notify_waiters();

        if self.fail {
            return Err(DeliveryError::Rejected {
                status: 503,
                message: "gateway unavailable".to_string(),
            });
        }
        Ok(id)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
