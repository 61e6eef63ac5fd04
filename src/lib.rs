//! Entity reconciliation engine: cached, federated candidate lookup with
//! same-as aggregation.
//!
//! # Public API Surface
//!
//! The exports are organized by module:
//!
//! ## Core Model (Stable)
//! - [`Query`], [`Request`], [`Response`], [`Candidate`] - The reconciliation vocabulary
//! - [`EntityId`], [`EntityType`], [`TypeInterner`] - Identity and type tags
//! - [`LanguagePreference`], [`CallContext`] - Per-request ambient state
//!
//! ## Resolvers
//! - [`SingleSourceResolver`] - One backing source with caching, enrichment, and aggregation
//! - [`FederatedResolver`] - Bounded concurrent fan-out over an ordered member list
//! - [`RemoteDelegate`] - Delegation to another reconciliation-compatible service
//! - [`LookupRegistry`] - Name-keyed dispatch table shared with the service surface
//! - [`ReconService`] - The request-facing surface a transport layer calls
//!
//! ## Pipeline
//! - [`ResultCache`], [`Fingerprint`] - Content-keyed result caching with single-flight misses
//! - [`SameAsAggregator`] - Equivalence folding with strict result ordering
//! - [`ScoreOptions`] - Linear per-member score adjustment
//!
//! ## Wire Protocol
//! - [`WireQuery`], [`WireCandidate`], [`ManifestDoc`] - Serde DTOs for the
//!   reconciliation contract; the core model itself stays serde-free
//!
//! ## Configuration
//! - [`Config`], [`ConfigError`] - Environment-driven engine configuration
//!
//! ## Test/Mock Support
//! Mock collaborators are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod federation;
pub mod fingerprint;
pub mod model;
pub mod protocol;
pub mod remote;
pub mod resolver;
pub mod sameas;
pub mod scoring;
pub mod service;

pub use cache::{CacheEntry, ResultCache};
pub use config::{Config, ConfigError};
pub use federation::{
    FederatedResolver, FederatedResolverBuilder, FederationConfig, FederationMember, TimeoutPolicy,
};
pub use fingerprint::Fingerprint;
pub use model::{
    Candidate, CallContext, DEFAULT_LANGUAGE, EntityId, EntityType, LanguagePreference,
    PropertyConstraint, PropertyValue, Query, Request, Response, TypeInterner, TypeRef,
};
pub use protocol::{
    ManifestDoc, ManifestServices, WireBatch, WireCandidate, WireEntityRef, WireProperty,
    WirePropertyValue, WireQuery, WireResult, WireResults, WireType,
};
pub use remote::{
    HttpTransport, ManifestCache, RemoteCapabilities, RemoteDelegate, RemoteDelegateBuilder,
    RemoteDescriptionService, RemoteLabelService, RemoteMethod, RemoteSource, RemoteTransport,
    RemoteTypeService, TransportError,
};
#[cfg(any(test, feature = "mock"))]
pub use remote::{MockTransport, RecordedCall};
pub use resolver::{
    DescriptionSource, EntitySource, LabelSink, LabelSource, LookupRegistry, RawCandidate,
    ResolveError, ResolveResult, Resolver, ResolverKind, SameAsOracle, SingleSourceResolver,
    SingleSourceResolverBuilder, SourceError, TypeSource,
};
#[cfg(any(test, feature = "mock"))]
pub use resolver::mock::{MockEntitySource, MockEnrichment, MockLabelSink, MockSameAsOracle};
pub use sameas::{AggregationError, AggregatorConfig, SameAsAggregator, SameAsGroup};
pub use scoring::ScoreOptions;
pub use service::{ReconService, ReconServiceBuilder};
