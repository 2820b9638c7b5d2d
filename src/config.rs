//! Engine configuration.
//!
//! Loaded from environment variables with defaults; the CLI can override each
//! value with a flag.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

pub const DEFAULT_HOLD_MINUTES: i64 = 15;
pub const DEFAULT_CANCELLATION_CUTOFF_HOURS: i64 = 24;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CURRENCY: &str = "usd";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// How long a pending booking holds its room, in minutes.
    pub hold_minutes: i64,
    /// Guests may not cancel once arrival is closer than this, in hours.
    pub cancellation_cutoff_hours: i64,
    /// ISO currency code sent to the payment gateway.
    pub currency: String,
    /// Period of the background expiry sweep, in seconds.
    pub sweep_interval_secs: u64,
    /// Shared secret for verifying gateway notification signatures.
    pub webhook_secret: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            hold_minutes: DEFAULT_HOLD_MINUTES,
            cancellation_cutoff_hours: DEFAULT_CANCELLATION_CUTOFF_HOURS,
            currency: DEFAULT_CURRENCY.to_string(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            webhook_secret: "whsec_development".to_string(),
        }
    }
}

impl BookingConfig {
    /// Reads `STAYBOOK_*` variables, keeping the default for anything absent or
    /// unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hold_minutes: parse_env("STAYBOOK_HOLD_MINUTES", defaults.hold_minutes),
            cancellation_cutoff_hours: parse_env(
                "STAYBOOK_CANCELLATION_CUTOFF_HOURS",
                defaults.cancellation_cutoff_hours,
            ),
            currency: env::var("STAYBOOK_CURRENCY").unwrap_or(defaults.currency),
            sweep_interval_secs: parse_env(
                "STAYBOOK_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            ),
            webhook_secret: env::var("STAYBOOK_WEBHOOK_SECRET").unwrap_or(defaults.webhook_secret),
        }
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::minutes(self.hold_minutes)
    }

    pub fn cancellation_cutoff(&self) -> Duration {
        Duration::hours(self.cancellation_cutoff_hours)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
