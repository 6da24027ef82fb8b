//! # Features
//!
//! - `reminders`: deadline reminder scheduling and SMS delivery
//! - `rate_limiting`: per-recipient send throttling

pub mod rate_limiting;
pub mod reminders;

pub use rate_limiting::RateLimiter;
pub use reminders::{
    ReminderPayload, ReminderPolicy, ReminderScheduler, ReminderSet, TaskId, TaskReminders,
};
