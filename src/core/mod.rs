//! # Core Module
//!
//! Shared configuration for the reminder service.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Reduced to configuration only
//! - 1.0.0: Initial creation with config module

pub mod config;

pub use config::{Config, TwilioConfig};
