//! # Configuration
//!
//! Environment-driven settings for the reminder service. Values are read once at
//! startup; `.env` loading is left to the binary.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: SMS rate limit is opt-in, off unless SMS_RATE_LIMIT_MAX is set
//! - 1.1.0: Added per-recipient SMS rate limit settings
//! - 1.0.0: Initial release with Twilio credentials and reminder window

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Credentials for the Twilio Messages API
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,

    /// None when any Twilio variable is missing; reminders are then only logged
    pub twilio: Option<TwilioConfig>,

    pub sms_timeout: Duration,

    /// Deadlines must be strictly further away than this
    pub min_lead: Duration,

    /// Deadlines may be at most this far away
    pub max_horizon: Duration,

    /// Per-recipient send cap; None leaves outbound SMS unthrottled
    pub sms_rate_limit_max: Option<usize>,
    pub sms_rate_limit_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            twilio: None,
            sms_timeout: Duration::from_secs(10),
            min_lead: Duration::from_secs(2 * 60),
            max_horizon: Duration::from_secs(30 * 24 * 60 * 60),
            sms_rate_limit_max: None,
            sms_rate_limit_window: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (used by `from_env` and tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);

        let twilio = match (
            lookup("TWILIO_ACCOUNT_SID"),
            lookup("TWILIO_AUTH_TOKEN"),
            lookup("TWILIO_FROM_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_number,
                api_base: lookup("TWILIO_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
            }),
            _ => None,
        };

        let sms_timeout = parse_var::<u64, _>(&lookup, "SMS_TIMEOUT_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.sms_timeout);

        let min_lead = parse_var::<u64, _>(&lookup, "REMINDER_MIN_LEAD_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.min_lead);

        let max_horizon = parse_var::<u64, _>(&lookup, "REMINDER_MAX_HORIZON_DAYS")?
            .map(|days| Duration::from_secs(days * 24 * 60 * 60))
            .unwrap_or(defaults.max_horizon);

        if max_horizon <= min_lead {
            anyhow::bail!(
                "REMINDER_MAX_HORIZON_DAYS must be longer than REMINDER_MIN_LEAD_SECONDS"
            );
        }

        let sms_rate_limit_max = parse_var::<usize, _>(&lookup, "SMS_RATE_LIMIT_MAX")?
            .or(defaults.sms_rate_limit_max);

        let sms_rate_limit_window =
            parse_var::<u64, _>(&lookup, "SMS_RATE_LIMIT_WINDOW_SECONDS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.sms_rate_limit_window);

        Ok(Config {
            log_level,
            twilio,
            sms_timeout,
            min_lead,
            max_horizon,
            sms_rate_limit_max,
            sms_rate_limit_window,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => Ok(None),
    }
}
