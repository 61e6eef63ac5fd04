//! Delegation to remote reconciliation-compatible services.
//!
//! A [`RemoteDelegate`] behaves like any other resolver while forwarding its
//! queries over HTTP: each request travels as a single-entry query batch, the
//! keyed result map comes back, and the standard pipeline (caching, scoring,
//! enrichment wiring) applies on top. The remote service describes itself
//! through a manifest document fetched lazily and memoized per delegate; the
//! label, description, and type endpoints it advertises become enrichment
//! capabilities usable by local resolvers too.

mod delegate;
mod manifest;
mod transport;


pub use delegate::{
    RemoteDelegate, RemoteDelegateBuilder, RemoteDescriptionService, RemoteLabelService,
    RemoteSource, RemoteTypeService,
};
pub use manifest::{ManifestCache, RemoteCapabilities};
pub use transport::{HttpTransport, RemoteTransport, TransportError};

#[cfg(any(test, feature = "mock"))]
pub use transport::{MockTransport, RecordedCall};

/// How a query batch travels to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteMethod {
    /// Batch JSON in a `queries` URL parameter.
    Get,
    /// Batch nested under a `queries` key in a JSON body.
    PostJson,
    /// Batch JSON in a `queries` form field. The widest-supported transport,
    /// so the default.
    #[default]
    PostForm,
}
