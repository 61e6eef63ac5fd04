//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
///
/// Configuration problems are fatal: they surface at construction time and
/// never during resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that is not an integer.
    #[error("failed to parse {name}='{value}': {source}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// `RECON_TIMEOUT_POLICY` named an unknown policy.
    #[error("invalid timeout policy '{value}': expected 'partial' or 'fail'")]
    InvalidTimeoutPolicy { value: String },

    /// Parallelism must allow at least one in-flight member.
    #[error("{name} must be at least 1")]
    ZeroParallelism { name: &'static str },

    /// Score precision outside the supported window.
    #[error("score digits must be in 0..=8, got {value}")]
    ScoreDigitsOutOfRange { value: u64 },

    /// A resolver, federation, or delegate was built from an unusable
    /// definition (empty name, missing endpoint, ...).
    #[error("invalid resolver definition: {reason}")]
    InvalidResolver { reason: String },
}
