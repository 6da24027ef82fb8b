//! # Task Reminder Service
//!
//! Entry points for the task handlers: create, edit and delete hooks that
//! validate the deadline, compute reminders and keep the scheduler in sync.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: Per-recipient SMS limit only applies when `SMS_RATE_LIMIT_MAX` is set
//! - 1.0.0: Initial release

use super::calculator::{DeadlineError, ReminderPolicy, ReminderSet};
use super::dispatcher::{
    LogDispatcher, NotificationDispatcher, RateLimitedDispatcher, TwilioDispatcher,
};
use super::registry::TaskId;
use super::scheduler::{ReminderPayload, ReminderScheduler};
use crate::core::Config;
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;

#[derive(Clone)]
pub struct TaskReminders {
    scheduler: ReminderScheduler,
    policy: ReminderPolicy,
}

impl TaskReminders {
    pub fn new(scheduler: ReminderScheduler, policy: ReminderPolicy) -> Self {
        Self { scheduler, policy }
    }

    /// Build the service from config: Twilio when credentials are present,
    /// otherwise the dry-run log dispatcher.
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.twilio {
            Some(twilio) => {
                let twilio = TwilioDispatcher::new(twilio.clone(), config.sms_timeout)?;
                Ok(Self::from_config_with(config, twilio))
            }
            None => {
                info!("Twilio credentials not set - reminders will only be logged");
                Ok(Self::from_config_with(config, LogDispatcher))
            }
        }
    }

    /// Build the service around `dispatcher`, adding the per-recipient limit
    /// only when `sms_rate_limit_max` is configured
    pub fn from_config_with<D>(config: &Config, dispatcher: D) -> Self
    where
        D: NotificationDispatcher + 'static,
    {
        let dispatcher: Arc<dyn NotificationDispatcher> = match config.sms_rate_limit_max {
            Some(max) => {
                info!(
                    "SMS rate limit: {max} per recipient every {}s",
                    config.sms_rate_limit_window.as_secs()
                );
                Arc::new(RateLimitedDispatcher::new(
                    dispatcher,
                    max,
                    config.sms_rate_limit_window,
                ))
            }
            None => Arc::new(dispatcher),
        };

        let policy = ReminderPolicy::new(config.min_lead, config.max_horizon);
        Self::new(ReminderScheduler::new(dispatcher), policy)
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    /// New task: validate, compute and arm its reminders.
    ///
    /// Returns the reminder set so the caller can store it with the task.
    pub fn on_task_created(
        &self,
        task_id: &TaskId,
        title: &str,
        deadline: DateTime<Utc>,
        recipient: &str,
    ) -> Result<ReminderSet, DeadlineError> {
        let reminders = self.policy.reminders(deadline, Utc::now())?;
        let payload = ReminderPayload::new(title, deadline, recipient);
        self.scheduler.arrange(task_id, &reminders, &payload);
        Ok(reminders)
    }

    /// Edited task: replace its reminders, or just drop them once completed.
    ///
    /// The deadline is validated first, even when `completed` is set. On `Err`
    /// nothing changes and the old reminders stay armed, so the caller must
    /// reject the whole edit (completion flag included) rather than persist it.
    pub fn on_task_edited(
        &self,
        task_id: &TaskId,
        title: &str,
        deadline: DateTime<Utc>,
        completed: bool,
        recipient: &str,
    ) -> Result<ReminderSet, DeadlineError> {
        let reminders = self.policy.reminders(deadline, Utc::now())?;

        self.scheduler.cancel(task_id);
        if !completed {
            let payload = ReminderPayload::new(title, deadline, recipient);
            self.scheduler.arrange(task_id, &reminders, &payload);
        }
        Ok(reminders)
    }

    pub fn on_task_deleted(&self, task_id: &TaskId) -> usize {
        self.scheduler.cancel(task_id)
    }

    pub fn shutdown(&self) -> usize {
        self.scheduler.shutdown()
    }
}
