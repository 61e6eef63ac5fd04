//! Resolution error types.

use thiserror::Error;

use crate::sameas::AggregationError;

/// Result alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors surfaced by resolvers.
///
/// `Clone` because a cached resolution shares one failure with every waiter
/// that piled up on the in-flight entry.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The backing entity source failed the search.
    #[error("resolver '{resolver}' search failed: {reason}")]
    Search { resolver: String, reason: String },

    /// A label, description, or type collaborator failed during enrichment.
    #[error("enrichment failed: {reason}")]
    Enrichment { reason: String },

    /// Same-as aggregation failed.
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// A federated resolution exceeded its wall-clock budget under the
    /// fail-on-timeout policy.
    #[error("federated resolution timed out after {budget_ms} ms")]
    Timeout { budget_ms: u64 },

    /// A remote service's manifest could not be fetched or parsed.
    #[error("manifest unavailable for {url}: {reason}")]
    ManifestUnavailable { url: String, reason: String },

    /// No resolver is registered under the requested name.
    #[error("no resolver registered under '{name}'")]
    UnknownResolver { name: String },

    /// Task orchestration itself failed (worker panic or runtime shutdown).
    #[error("resolution orchestration failed: {reason}")]
    Orchestration { reason: String },
}

impl ResolveError {
    /// Short tag for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Search { .. } => "search",
            Self::Enrichment { .. } => "enrichment",
            Self::Aggregation(_) => "aggregation",
            Self::Timeout { .. } => "timeout",
            Self::ManifestUnavailable { .. } => "manifest",
            Self::UnknownResolver { .. } => "unknown_resolver",
            Self::Orchestration { .. } => "orchestration",
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors raised by entity sources and enrichment collaborators.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The backing store rejected or failed the operation.
    #[error("source backend failed: {reason}")]
    Backend { reason: String },

    /// The source is temporarily unreachable.
    #[error("source unavailable: {reason}")]
    Unavailable { reason: String },

    /// The source answered with something the engine cannot interpret.
    #[error("malformed source response: {reason}")]
    Malformed { reason: String },
}

impl SourceError {
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
