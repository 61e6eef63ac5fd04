//! Aggregation error types.

use thiserror::Error;

/// Errors raised during same-as aggregation.
///
/// `Clone` because aggregation runs inside cached resolutions, where one
/// error may be handed to several concurrent waiters.
#[derive(Debug, Clone, Error)]
pub enum AggregationError {
    /// The equivalence oracle could not be consulted.
    #[error("same-as oracle failed: {reason}")]
    Oracle { reason: String },
}
