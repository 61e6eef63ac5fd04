//! The reconciliation surface a transport layer calls into.
//!
//! [`ReconService`] fronts a [`LookupRegistry`]: single lookups and batches
//! dispatch through a configured default resolver, and the discovery
//! document is assembled from whatever the registered resolvers advertise.
//! It owns no transport concerns; a REST layer maps HTTP onto these calls.


use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, instrument, warn};

use crate::config::ConfigError;
use crate::model::{CallContext, EntityType, Query, Request, Response};
use crate::protocol::{ManifestDoc, WireType};
use crate::resolver::{LookupRegistry, ResolveError, ResolveResult, Resolver};

/// Reconciliation API revisions this engine speaks.
const API_VERSIONS: &[&str] = &["0.2"];

/// The engine's request-facing surface.
pub struct ReconService {
    name: String,
    identifier_space: Option<String>,
    schema_space: Option<String>,
    registry: Arc<LookupRegistry>,
    default_resolver: String,
}

impl std::fmt::Debug for ReconService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconService")
            .field("name", &self.name)
            .field("default_resolver", &self.default_resolver)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ReconService {
    /// Starts a builder for a service named `name` answering through
    /// `default_resolver`.
    pub fn builder(
        name: impl Into<String>,
        default_resolver: impl Into<String>,
    ) -> ReconServiceBuilder {
        ReconServiceBuilder::new(name, default_resolver)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registry lookups dispatch through, shared with configuration code
    /// that registers resolvers at runtime.
    #[inline]
    pub fn registry(&self) -> &Arc<LookupRegistry> {
        &self.registry
    }

    /// The resolver registered under `name`, or [`ResolveError::UnknownResolver`].
    pub fn resolver_for(&self, name: &str) -> ResolveResult<Arc<dyn Resolver>> {
        self.registry
            .by_name(name)
            .ok_or_else(|| ResolveError::UnknownResolver {
                name: name.to_string(),
            })
    }

    /// Resolves one request through the default resolver.
    #[instrument(
        skip(self, request, context),
        fields(service = %self.name, query_id = %request.id)
    )]
    pub async fn lookup(&self, request: &Request, context: &CallContext) -> ResolveResult<Response> {
        let resolver = self.resolver_for(&self.default_resolver)?;
        resolver.resolve(request, context).await
    }

    /// Resolves a keyed batch of queries concurrently.
    ///
    /// Entries are isolated: a failing entry comes back as an empty response
    /// under its id, with the failure detail in diagnostics only. The call
    /// itself fails only when the default resolver is not registered.
    #[instrument(skip(self, batch, context), fields(service = %self.name, entries = batch.len()))]
    pub async fn lookup_batch(
        &self,
        batch: BTreeMap<String, Query>,
        context: &CallContext,
    ) -> ResolveResult<BTreeMap<String, Response>> {
        let resolver = self.resolver_for(&self.default_resolver)?;

        let entries = batch.into_iter().map(|(id, query)| {
            let resolver = Arc::clone(&resolver);
            async move {
                let request = Request::new(id.clone(), query);
                match resolver.resolve(&request, context).await {
                    Ok(response) => (id, response),
                    Err(error) => {
                        warn!(
                            query_id = %id,
                            error = %error,
                            kind = error.kind(),
                            "batch entry failed; answering with an empty result"
                        );
                        let response = Response::empty(id.as_str());
                        (id, response)
                    }
                }
            }
        });

        let resolved = join_all(entries).await;
        debug!(entries = resolved.len(), "batch resolution complete");
        Ok(resolved.into_iter().collect())
    }

    /// Deduplicated union of the types every registered resolver advertises,
    /// in registry name order.
    pub fn available_entity_types(&self) -> Vec<Arc<EntityType>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut union = Vec::new();
        for resolver in self.registry.all() {
            for entity_type in resolver.default_types() {
                if seen.insert(entity_type.id().to_string()) {
                    union.push(entity_type);
                }
            }
        }
        union
    }

    /// The discovery document describing this service.
    pub fn service_manifest(&self) -> ManifestDoc {
        let default_types = self
            .available_entity_types()
            .iter()
            .map(|entity_type| WireType {
                id: entity_type.id().to_string(),
                name: entity_type.name().map(str::to_string),
            })
            .collect();

        ManifestDoc {
            name: Some(self.name.clone()),
            identifier_space: self.identifier_space.clone(),
            schema_space: self.schema_space.clone(),
            default_types,
            versions: API_VERSIONS.iter().map(|v| v.to_string()).collect(),
            ..ManifestDoc::default()
        }
    }
}

/// Builder for [`ReconService`].
pub struct ReconServiceBuilder {
    name: String,
    identifier_space: Option<String>,
    schema_space: Option<String>,
    registry: Option<Arc<LookupRegistry>>,
    default_resolver: String,
}

impl ReconServiceBuilder {
    fn new(name: impl Into<String>, default_resolver: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier_space: None,
            schema_space: None,
            registry: None,
            default_resolver: default_resolver.into(),
        }
    }

    /// IRI namespace candidate identifiers live in, echoed in the manifest.
    pub fn identifier_space(mut self, space: impl Into<String>) -> Self {
        self.identifier_space = Some(space.into());
        self
    }

    /// IRI namespace type identifiers live in, echoed in the manifest.
    pub fn schema_space(mut self, space: impl Into<String>) -> Self {
        self.schema_space = Some(space.into());
        self
    }

    /// Shares an existing registry instead of starting an empty one.
    pub fn registry(mut self, registry: Arc<LookupRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<ReconService, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::InvalidResolver {
                reason: "service name must not be empty".to_string(),
            });
        }
        let default_resolver = self.default_resolver.trim().to_string();
        if default_resolver.is_empty() {
            return Err(ConfigError::InvalidResolver {
                reason: "service default resolver must not be empty".to_string(),
            });
        }

        Ok(ReconService {
            name,
            identifier_space: self.identifier_space,
            schema_space: self.schema_space,
            registry: self.registry.unwrap_or_default(),
            default_resolver,
        })
    }
}
