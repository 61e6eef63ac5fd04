//! Multi-source federation.
//!
//! A [`FederatedResolver`] fans one request out to an ordered list of member
//! resolvers, runs them concurrently under a shared wall-clock budget, and
//! concatenates the successful results in member order. Member failures are
//! logged and excluded; they never abort siblings.

mod coordinator;

#[cfg(test)]
mod tests;

pub use coordinator::{FederatedResolver, FederatedResolverBuilder};

use std::sync::Arc;
use std::time::Duration;

use crate::resolver::Resolver;
use crate::scoring::ScoreOptions;

/// What a federated request does with members still running at the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Merge what finished in time; late members count as failed.
    #[default]
    Partial,
    /// Fail the whole request with a timeout error.
    Fail,
}

impl TimeoutPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Partial => "partial",
            Self::Fail => "fail",
        }
    }
}

/// Fan-out tuning for a [`FederatedResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FederationConfig {
    /// Upper bound on concurrently running member resolutions.
    pub max_parallelism: usize,
    /// Wall-clock budget for the whole member batch.
    pub timeout: Duration,
    /// Behavior when the budget expires with members still running.
    pub on_timeout: TimeoutPolicy,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 8,
            timeout: Duration::from_millis(10_000),
            on_timeout: TimeoutPolicy::Partial,
        }
    }
}

/// One federation member: a resolver plus an optional score adjustment
/// applied to everything it contributes, before any adjustment the caller
/// applies to the merged response.
#[derive(Clone)]
pub struct FederationMember {
    pub resolver: Arc<dyn Resolver>,
    pub score_options: Option<ScoreOptions>,
}

impl FederationMember {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            score_options: None,
        }
    }

    pub fn with_score_options(resolver: Arc<dyn Resolver>, options: ScoreOptions) -> Self {
        Self {
            resolver,
            score_options: Some(options),
        }
    }
}

impl std::fmt::Debug for FederationMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationMember")
            .field("resolver", &self.resolver.name())
            .field("score_options", &self.score_options)
            .finish()
    }
}
