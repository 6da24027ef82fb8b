//! # Rate Limiting Feature
//!
//! Prevents SMS floods with configurable per-recipient limits.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod limiter;

pub use limiter::RateLimiter;
