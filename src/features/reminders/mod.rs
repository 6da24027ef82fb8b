//! # Reminders Feature
//!
//! Deadline reminders for tasks: three SMS per task, cancelled or replaced when
//! the task is edited, completed or deleted.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true

pub mod calculator;
pub mod dispatcher;
pub mod registry;
pub mod scheduler;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

pub use calculator::{
    compute_reminders, parse_deadline, DeadlineError, ReminderPolicy, ReminderSet,
};
pub use dispatcher::{
    DeliveryError, LogDispatcher, NotificationDispatcher, RateLimitedDispatcher, SmsMessage,
    TwilioDispatcher,
};
pub use registry::{JobRegistry, JobSnapshot, JobState, ScheduledJob, TaskId};
pub use scheduler::{ReminderPayload, ReminderScheduler};
pub use service::TaskReminders;
