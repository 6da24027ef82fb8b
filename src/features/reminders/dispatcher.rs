//! # Notification Dispatcher
//!
//! Sends one reminder SMS to one recipient. Dispatchers know nothing about
//! scheduling; the scheduler calls them once per fired job and logs any error.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Added RateLimitedDispatcher wrapper
//! - 1.1.0: Added LogDispatcher for running without Twilio credentials
//! - 1.0.0: Initial release with Twilio Messages API

use crate::core::config::TwilioConfig;
use crate::features::rate_limiting::RateLimiter;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Outbound SMS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub body: String,
    pub to: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("SMS gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("SMS gateway rejected message (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("SMS gateway returned an unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Too many messages to {recipient}, retry in {retry_after:?}")]
    RateLimited {
        recipient: String,
        retry_after: Duration,
    },
}

/// Delivers a single message, returning the gateway's message id
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, message: &SmsMessage) -> Result<String, DeliveryError>;

    /// Short label used in logs
    fn name(&self) -> &'static str;
}

/// Twilio Messages API client
pub struct TwilioDispatcher {
    client: reqwest::Client,
    config: TwilioConfig,
}

#[derive(Deserialize)]
struct TwilioMessageResponse {
    sid: Option<String>,
    message: Option<String>,
}

impl TwilioDispatcher {
    pub fn new(config: TwilioConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tasky/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl NotificationDispatcher for TwilioDispatcher {
    async fn dispatch(&self, message: &SmsMessage) -> Result<String, DeliveryError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", message.to.as_str()),
                ("From", self.config.from_number.as_str()),
                ("Body", message.body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let parsed = serde_json::from_str::<TwilioMessageResponse>(&text).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|p| p.message)
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let sid = parsed.and_then(|p| p.sid).ok_or_else(|| {
            DeliveryError::InvalidResponse("missing message sid".to_string())
        })?;

        debug!("Twilio accepted message {sid} to {}", message.to);
        Ok(sid)
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}

/// Dry-run dispatcher that only logs the message
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, message: &SmsMessage) -> Result<String, DeliveryError> {
        info!("📨 [dry-run] SMS to {}: {}", message.to, message.body);
        Ok(format!("dry-run-{}", uuid::Uuid::new_v4()))
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Wraps a dispatcher with a per-recipient send limit
pub struct RateLimitedDispatcher<D> {
    inner: D,
    limiter: RateLimiter,
}

impl<D: NotificationDispatcher> RateLimitedDispatcher<D> {
    pub fn new(inner: D, max_messages: usize, window: Duration) -> Self {
        Self {
            inner,
            limiter: RateLimiter::new(max_messages, window),
        }
    }

    /// Recipients with sends still inside the current window
    pub fn tracked_recipients(&self) -> usize {
        self.limiter.tracked_keys()
    }
}

#[async_trait]
impl<D: NotificationDispatcher> NotificationDispatcher for RateLimitedDispatcher<D> {
    async fn dispatch(&self, message: &SmsMessage) -> Result<String, DeliveryError> {
        if !self.limiter.check_rate_limit(&message.to) {
            return Err(DeliveryError::RateLimited {
                recipient: message.to.clone(),
                retry_after: self.limiter.retry_after(&message.to),
            });
        }
        self.inner.dispatch(message).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
