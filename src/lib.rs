// Core layer - shared configuration
pub mod core;

// Features layer - reminder scheduling and delivery
pub mod features;

pub use crate::core::Config;

pub use features::{
    // Rate limiting
    RateLimiter,
    // Reminders
    ReminderPayload, ReminderPolicy, ReminderScheduler, ReminderSet, TaskId, TaskReminders,
};
