//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `RECON_*` environment variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::time::Duration;

use crate::federation::{FederationConfig, TimeoutPolicy};
use crate::sameas::AggregatorConfig;

/// Largest supported score precision (decimal digits).
pub const MAX_SCORE_DIGITS: u32 = 8;

/// Engine configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `RECON_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Max entries in a resolver's result cache. `0` disables caching.
    /// Default: `1024`.
    pub cache_capacity: u64,

    /// Time-to-live for cached results. Default: one hour.
    pub cache_ttl: Duration,

    /// Upper bound on concurrently running federation members. Default: `8`.
    pub max_parallelism: usize,

    /// Wall-clock budget for one federated resolution. Default: 10 seconds.
    pub federation_timeout: Duration,

    /// What a federation does with members still running at the deadline.
    /// Default: merge what finished.
    pub timeout_policy: TimeoutPolicy,

    /// System-wide language fallback chain. Default: `en`.
    pub default_languages: Vec<String>,

    /// Decimal digits considered significant when same-as aggregation groups
    /// near-equal scores. Default: `2`.
    pub score_digits: u32,

    /// Drop folded same-as secondaries instead of returning them pinned
    /// beneath their primary. Default: `false`.
    pub filter_secondaries: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            cache_ttl: Duration::from_secs(3600),
            max_parallelism: 8,
            federation_timeout: Duration::from_millis(10_000),
            timeout_policy: TimeoutPolicy::Partial,
            default_languages: vec![crate::model::DEFAULT_LANGUAGE.to_string()],
            score_digits: 2,
            filter_secondaries: false,
        }
    }
}

impl Config {
    const ENV_CACHE_CAPACITY: &'static str = "RECON_CACHE_CAPACITY";
    const ENV_CACHE_TTL_SECS: &'static str = "RECON_CACHE_TTL_SECS";
    const ENV_MAX_PARALLELISM: &'static str = "RECON_MAX_PARALLELISM";
    const ENV_FEDERATION_TIMEOUT_MS: &'static str = "RECON_FEDERATION_TIMEOUT_MS";
    const ENV_TIMEOUT_POLICY: &'static str = "RECON_TIMEOUT_POLICY";
    const ENV_DEFAULT_LANGUAGES: &'static str = "RECON_DEFAULT_LANGUAGES";
    const ENV_SCORE_DIGITS: &'static str = "RECON_SCORE_DIGITS";
    const ENV_FILTER_SECONDARIES: &'static str = "RECON_FILTER_SECONDARIES";

    /// Loads configuration from environment variables (falling back to
    /// defaults) and validates it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cache_capacity =
            Self::parse_u64_from_env(Self::ENV_CACHE_CAPACITY, defaults.cache_capacity)?;
        let cache_ttl =
            Self::parse_u64_from_env(Self::ENV_CACHE_TTL_SECS, defaults.cache_ttl.as_secs())
                .map(Duration::from_secs)?;
        let max_parallelism = Self::parse_u64_from_env(
            Self::ENV_MAX_PARALLELISM,
            defaults.max_parallelism as u64,
        )? as usize;
        let federation_timeout = Self::parse_u64_from_env(
            Self::ENV_FEDERATION_TIMEOUT_MS,
            defaults.federation_timeout.as_millis() as u64,
        )
        .map(Duration::from_millis)?;
        let timeout_policy = Self::parse_policy_from_env(defaults.timeout_policy)?;
        let default_languages = Self::parse_languages_from_env(defaults.default_languages);
        let score_digits =
            Self::parse_u64_from_env(Self::ENV_SCORE_DIGITS, u64::from(defaults.score_digits))?;
        let score_digits = u32::try_from(score_digits)
            .map_err(|_| ConfigError::ScoreDigitsOutOfRange { value: score_digits })?;
        let filter_secondaries =
            Self::parse_bool_from_env(Self::ENV_FILTER_SECONDARIES, defaults.filter_secondaries);

        let config = Self {
            cache_capacity,
            cache_ttl,
            max_parallelism,
            federation_timeout,
            timeout_policy,
            default_languages,
            score_digits,
            filter_secondaries,
        };
        config.validate()?;

        Ok(config)
    }

    /// Validates range invariants (no environment access).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallelism == 0 {
            return Err(ConfigError::ZeroParallelism {
                name: Self::ENV_MAX_PARALLELISM,
            });
        }

        if self.score_digits > MAX_SCORE_DIGITS {
            return Err(ConfigError::ScoreDigitsOutOfRange {
                value: u64::from(self.score_digits),
            });
        }

        Ok(())
    }

    /// Federation settings carried by this configuration.
    pub fn federation(&self) -> FederationConfig {
        FederationConfig {
            max_parallelism: self.max_parallelism,
            timeout: self.federation_timeout,
            on_timeout: self.timeout_policy,
        }
    }

    /// Same-as aggregation settings carried by this configuration.
    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            score_digits: self.score_digits,
            filter_secondaries: self.filter_secondaries,
        }
    }

    fn parse_u64_from_env(name: &'static str, default: u64) -> Result<u64, ConfigError> {
        match env::var(name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidNumber {
                    name,
                    value,
                    source,
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_policy_from_env(default: TimeoutPolicy) -> Result<TimeoutPolicy, ConfigError> {
        match env::var(Self::ENV_TIMEOUT_POLICY) {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "partial" => Ok(TimeoutPolicy::Partial),
                "fail" => Ok(TimeoutPolicy::Fail),
                _ => Err(ConfigError::InvalidTimeoutPolicy { value }),
            },
            Err(_) => Ok(default),
        }
    }

    fn parse_languages_from_env(default: Vec<String>) -> Vec<String> {
        match env::var(Self::ENV_DEFAULT_LANGUAGES) {
            Ok(value) => {
                let tags: Vec<String> = value
                    .split(',')
                    .map(|tag| tag.trim().to_ascii_lowercase())
                    .filter(|tag| !tag.is_empty())
                    .collect();
                if tags.is_empty() { default } else { tags }
            }
            Err(_) => default,
        }
    }

    fn parse_bool_from_env(name: &'static str, default: bool) -> bool {
        env::var(name)
            .ok()
            .map(|value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(default)
    }
}
