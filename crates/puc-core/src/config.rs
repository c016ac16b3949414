//! Configuration for the earnings ledger.
//!
//! # Configuration Sources
//!
//! Configuration can be loaded from:
//! - Environment variables (prefixed with `PUC_`)
//! - JSON files (via serde)
//! - Programmatic defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use puc_core::{config::LedgerConfig, Money};
//!
//! let config = LedgerConfig::builder()
//!     .flat_rate(Money::from_dollars(5))
//!     .weekly_pool(Money::from_dollars(250))
//!     .build()?;
//! ```

use crate::{LedgerError, Money, Result, UserId};
use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Complete ledger configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Earning rules.
    pub earnings: EarningsConfig,

    /// Weekly pool provisioning.
    pub pool: PoolConfig,

    /// Payout aggregation.
    pub payout: PayoutConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl LedgerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> LedgerConfigBuilder {
        LedgerConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Looks for variables prefixed with `PUC_`:
    /// - `PUC_FLAT_RATE_CENTS` - Credit per qualifying submission, in cents
    /// - `PUC_MIN_VERIFIED_COUNT` - Verified pull-ups needed to earn
    /// - `PUC_WEEKLY_POOL_CENTS` - Size of each weekly pool, in cents
    /// - `PUC_LOG_LEVEL` - Logging level (trace, debug, info, warn, error)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from an environment lookup onto this configuration.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(cents) = lookup("PUC_FLAT_RATE_CENTS") {
            self.earnings.flat_rate = Money::from_cents(parse_env("PUC_FLAT_RATE_CENTS", &cents)?);
        }

        if let Some(count) = lookup("PUC_MIN_VERIFIED_COUNT") {
            self.earnings.min_verified_count = parse_env("PUC_MIN_VERIFIED_COUNT", &count)?;
        }

        if let Some(cents) = lookup("PUC_WEEKLY_POOL_CENTS") {
            self.pool.weekly_amount =
                Money::from_cents(parse_env("PUC_WEEKLY_POOL_CENTS", &cents)?);
        }

        if let Some(level) = lookup("PUC_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.earnings.flat_rate.is_zero() {
            return Err(LedgerError::ConfigError(
                "flat_rate must be greater than 0".into(),
            ));
        }

        if self.earnings.min_verified_count == 0 {
            return Err(LedgerError::ConfigError(
                "min_verified_count must be at least 1".into(),
            ));
        }

        if self.pool.weekly_amount.is_zero() {
            return Err(LedgerError::ConfigError(
                "weekly_amount must be greater than 0".into(),
            ));
        }

        if self.earnings.flat_rate > self.pool.weekly_amount {
            return Err(LedgerError::ConfigError(
                "flat_rate cannot exceed weekly_amount".into(),
            ));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| LedgerError::ConfigError(format!("Invalid {name}: {e}")))
}

/// Earning rules applied at approval time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarningsConfig {
    /// Credit per qualifying submission.
    pub flat_rate: Money,

    /// Minimum verified pull-up count for a submission to earn.
    pub min_verified_count: u32,

    /// Recompute the affected monthly payout inside every approval/reversal.
    pub refresh_payouts_on_change: bool,
}

impl Default for EarningsConfig {
    fn default() -> Self {
        Self {
            flat_rate: Money::from_dollars(5),
            min_verified_count: 1,
            refresh_payouts_on_change: true,
        }
    }
}

/// Weekly pool provisioning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Size of each newly provisioned weekly pool.
    pub weekly_amount: Money,

    /// First day of a pool week.
    pub week_start: Weekday,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            weekly_amount: Money::from_dollars(250),
            week_start: Weekday::Mon,
        }
    }
}

/// Payout aggregation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutConfig {
    /// Accounts excluded from payouts in addition to profiles flagged `excluded`.
    pub excluded_users: Vec<UserId>,
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// JSON output format.
    pub json_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json_output: false,
        }
    }
}

/// Builder for LedgerConfig.
#[derive(Default)]
pub struct LedgerConfigBuilder {
    config: LedgerConfig,
}

impl LedgerConfigBuilder {
    /// Set the per-submission credit.
    pub fn flat_rate(mut self, rate: Money) -> Self {
        self.config.earnings.flat_rate = rate;
        self
    }

    /// Set the minimum verified count.
    pub fn min_verified_count(mut self, count: u32) -> Self {
        self.config.earnings.min_verified_count = count;
        self
    }

    /// Toggle payout recomputation inside approvals.
    pub fn refresh_payouts_on_change(mut self, enabled: bool) -> Self {
        self.config.earnings.refresh_payouts_on_change = enabled;
        self
    }

    /// Set the weekly pool size.
    pub fn weekly_pool(mut self, amount: Money) -> Self {
        self.config.pool.weekly_amount = amount;
        self
    }

    /// Set the first weekday of a pool week.
    pub fn week_start(mut self, day: Weekday) -> Self {
        self.config.pool.week_start = day;
        self
    }

    /// Exclude an account from payouts.
    pub fn exclude_user(mut self, user: UserId) -> Self {
        self.config.payout.excluded_users.push(user);
        self
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Enable JSON log output.
    pub fn json_logs(mut self, enabled: bool) -> Self {
        self.config.logging.json_output = enabled;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<LedgerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
