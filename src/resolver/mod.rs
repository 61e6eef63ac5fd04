//! Resolution pipeline: the resolver contract, the single-source pipeline,
//! and the registry the service dispatches through.

pub mod error;
pub mod registry;
pub mod single;
pub mod source;

#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use error::{ResolveError, ResolveResult, SourceError};
pub use registry::LookupRegistry;
pub use single::{SingleSourceResolver, SingleSourceResolverBuilder};
pub use source::{
    DescriptionSource, EntitySource, LabelSink, LabelSource, RawCandidate, SameAsOracle,
    TypeSource,
};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{CallContext, EntityType, Request, Response};

/// What a resolver is, structurally. Federations use this to refuse nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverKind {
    /// Wraps one local entity source.
    Single,
    /// Fans out to member resolvers and merges.
    Federation,
    /// Delegates to a remote reconciliation service.
    Remote,
}

impl ResolverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Federation => "federation",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named unit of resolution: takes one request, returns scored candidates.
///
/// Implementations are shared behind `Arc` and called concurrently; all
/// state they carry must be internally synchronized.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves one request to a candidate list.
    async fn resolve(&self, request: &Request, context: &CallContext) -> ResolveResult<Response>;

    /// Stable name this resolver registers under.
    fn name(&self) -> &str;

    fn kind(&self) -> ResolverKind;

    /// Types this resolver suggests for schema discovery.
    fn default_types(&self) -> Vec<Arc<EntityType>> {
        Vec::new()
    }
}

impl fmt::Debug for dyn Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("dyn Resolver")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}
