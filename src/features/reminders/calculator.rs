//! # Reminder Calculator
//!
//! Validates a task deadline against the reminder window and turns it into the
//! ordered set of instants at which the owner gets an SMS.
//!
//! The window is `min_lead < deadline - now <= max_horizon`. Reminders split the
//! remaining time into quarters and fire at the first three quarter marks.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Accept naive `YYYY-MM-DD HH:MM[:SS]` deadlines as UTC
//! - 1.0.0: Initial release

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Number of reminders sent per task
pub const REMINDERS_PER_TASK: usize = 3;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeadlineError {
    #[error("Deadline is not a valid date: {0:?}")]
    Unparseable(String),

    #[error("Deadline cannot be backdated or within the next {}", format_window(.min_lead))]
    TooSoon { min_lead: Duration },

    #[error("Deadline cannot be more than {} away", format_window(.max_horizon))]
    TooFar { max_horizon: Duration },
}

/// Ordered reminder instants for one deadline. Recomputed wholesale on edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSet {
    instants: Vec<DateTime<Utc>>,
}

impl ReminderSet {
    pub fn instants(&self) -> &[DateTime<Utc>] {
        &self.instants
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.instants.iter()
    }

    pub fn len(&self) -> usize {
        self.instants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instants.is_empty()
    }
}

/// Lead-time window a deadline must fall into before reminders are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub min_lead: Duration,
    pub max_horizon: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        ReminderPolicy {
            min_lead: Duration::from_secs(2 * 60),
            max_horizon: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

impl ReminderPolicy {
    pub fn new(min_lead: Duration, max_horizon: Duration) -> Self {
        ReminderPolicy {
            min_lead,
            max_horizon,
        }
    }

    /// Check `min_lead < deadline - now <= max_horizon`
    pub fn validate(
        &self,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), DeadlineError> {
        let too_soon = DeadlineError::TooSoon {
            min_lead: self.min_lead,
        };

        // Negative deltas fail to_std(), which covers backdated deadlines
        let lead = (deadline - now).to_std().map_err(|_| too_soon.clone())?;

        if lead <= self.min_lead {
            return Err(too_soon);
        }
        if lead > self.max_horizon {
            return Err(DeadlineError::TooFar {
                max_horizon: self.max_horizon,
            });
        }
        Ok(())
    }

    /// Validate the deadline, then compute its reminder set
    pub fn reminders(
        &self,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ReminderSet, DeadlineError> {
        self.validate(deadline, now)?;
        Ok(compute_reminders(deadline, now))
    }
}

/// Split `(now, deadline)` into quarters and return the three inner marks.
///
/// Returns an empty set when the deadline is not after `now`.
pub fn compute_reminders(deadline: DateTime<Utc>, now: DateTime<Utc>) -> ReminderSet {
    let span = deadline - now;
    if span <= TimeDelta::zero() {
        return ReminderSet {
            instants: Vec::new(),
        };
    }

    let quarter = span / (REMINDERS_PER_TASK as i32 + 1);
    let instants = (1..=REMINDERS_PER_TASK as i32)
        .map(|k| now + quarter * k)
        .filter(|instant| *instant > now && *instant < deadline)
        .collect();

    ReminderSet { instants }
}

/// Parse a deadline string as RFC 3339, falling back to naive UTC formats
pub fn parse_deadline(raw: &str) -> Result<DateTime<Utc>, DeadlineError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DeadlineError::Unparseable(raw.to_string()))
}

fn format_window(window: &Duration) -> String {
    let secs = window.as_secs();
    if secs >= 86400 && secs % 86400 == 0 {
        let days = secs / 86400;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    } else if secs >= 3600 && secs % 3600 == 0 {
        let hours = secs / 3600;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if secs >= 60 && secs % 60 == 0 {
        let mins = secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else {
        format!("{} second{}", secs, if secs == 1 { "" } else { "s" })
    }
}
