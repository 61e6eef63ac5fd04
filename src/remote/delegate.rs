//! The remote delegate resolver and the enrichment capabilities it exposes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::cache::ResultCache;
use crate::config::ConfigError;
use crate::model::{
    CallContext, EntityId, EntityType, LanguagePreference, Request, Response, TypeRef,
};
use crate::protocol::{WireBatch, WireCandidate, WireQuery, WireResults, WireType};
use crate::resolver::{
    DescriptionSource, EntitySource, LabelSource, RawCandidate, ResolveResult, Resolver,
    ResolverKind, SingleSourceResolver, SourceError, TypeSource,
};
use crate::scoring::ScoreOptions;

use super::RemoteMethod;
use super::manifest::{ManifestCache, RemoteCapabilities};
use super::transport::{HttpTransport, RemoteTransport, TransportError};

/// [`EntitySource`] that sends each request to a remote reconciliation
/// service as a single-entry query batch and unpacks the keyed result map.
pub struct RemoteSource {
    endpoint: String,
    method: RemoteMethod,
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteSource {
    pub fn new(
        endpoint: impl Into<String>,
        method: RemoteMethod,
        transport: Arc<dyn RemoteTransport>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            transport,
        }
    }
}

impl std::fmt::Debug for RemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSource")
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl EntitySource for RemoteSource {
    async fn search(
        &self,
        request: &Request,
        languages: &LanguagePreference,
        _context: &CallContext,
    ) -> Result<Vec<RawCandidate>, SourceError> {
        let mut query = WireQuery::from_query(&request.query);
        if query.lang.is_empty() {
            query.lang = languages.as_slice().to_vec();
        }
        let mut batch = WireBatch::new();
        batch.insert(request.id.clone(), query);

        debug!(
            endpoint = %self.endpoint,
            method = ?self.method,
            "delegating query to remote service"
        );

        let value = match self.method {
            RemoteMethod::Get => {
                let encoded = encode_batch(&batch)?;
                self.transport
                    .get(&self.endpoint, &[("queries".to_string(), encoded)])
                    .await
            }
            RemoteMethod::PostJson => {
                self.transport
                    .post_json(&self.endpoint, &json!({ "queries": batch }))
                    .await
            }
            RemoteMethod::PostForm => {
                let encoded = encode_batch(&batch)?;
                self.transport
                    .post_form(&self.endpoint, &[("queries".to_string(), encoded)])
                    .await
            }
        }
        .map_err(to_source_error)?;

        let mut results: WireResults = serde_json::from_value(value)
            .map_err(|error| SourceError::malformed(error.to_string()))?;

        match results.remove(&request.id) {
            Some(entry) => Ok(entry
                .result
                .into_iter()
                .map(WireCandidate::into_raw)
                .collect()),
            None => {
                debug!(id = %request.id, "remote result map has no entry for our query id");
                Ok(Vec::new())
            }
        }
    }
}

fn encode_batch(batch: &WireBatch) -> Result<String, SourceError> {
    serde_json::to_string(batch).map_err(|error| SourceError::malformed(error.to_string()))
}

fn to_source_error(error: TransportError) -> SourceError {
    match &error {
        TransportError::Decode { .. } => SourceError::malformed(error.to_string()),
        _ => SourceError::unavailable(error.to_string()),
    }
}

/// Resolver that delegates to a remote reconciliation-compatible service.
///
/// Resolution behaves like any [`SingleSourceResolver`] (caching, language
/// negotiation, score adjustment) with candidates produced over the wire.
/// The remote manifest is fetched lazily on first capability use; the
/// label/description/type endpoints it advertises are exposed through
/// [`label_source`](Self::label_source) and friends for wiring into other
/// resolvers' enrichment.
pub struct RemoteDelegate {
    inner: SingleSourceResolver<RemoteSource>,
    manifest: Arc<ManifestCache>,
    transport: Arc<dyn RemoteTransport>,
}

impl std::fmt::Debug for RemoteDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDelegate")
            .field("inner", &self.inner)
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl RemoteDelegate {
    /// Starts a builder for a delegate named `name` talking to `base_url`.
    pub fn builder(
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> RemoteDelegateBuilder {
        RemoteDelegateBuilder::new(name, base_url)
    }

    /// The result cache, exposed for invalidation and inspection.
    #[inline]
    pub fn cache(&self) -> &ResultCache {
        self.inner.cache()
    }

    /// The remote capabilities, fetching the manifest on first use.
    pub async fn capabilities(&self) -> ResolveResult<Arc<RemoteCapabilities>> {
        self.manifest.get(self.transport.as_ref()).await
    }

    /// Drops the memoized manifest so the next use refetches it.
    pub async fn reload_manifest(&self) {
        self.manifest.reload().await;
    }

    /// Label lookup backed by the remote service's advertised endpoint.
    pub fn label_source(&self) -> Arc<RemoteLabelService> {
        Arc::new(RemoteLabelService {
            manifest: Arc::clone(&self.manifest),
            transport: Arc::clone(&self.transport),
        })
    }

    pub fn description_source(&self) -> Arc<RemoteDescriptionService> {
        Arc::new(RemoteDescriptionService {
            manifest: Arc::clone(&self.manifest),
            transport: Arc::clone(&self.transport),
        })
    }

    pub fn type_source(&self) -> Arc<RemoteTypeService> {
        Arc::new(RemoteTypeService {
            manifest: Arc::clone(&self.manifest),
            transport: Arc::clone(&self.transport),
        })
    }
}

#[async_trait]
impl Resolver for RemoteDelegate {
    async fn resolve(&self, request: &Request, context: &CallContext) -> ResolveResult<Response> {
        self.inner.resolve(request, context).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> ResolverKind {
        ResolverKind::Remote
    }

    fn default_types(&self) -> Vec<Arc<EntityType>> {
        self.inner.default_types()
    }
}

/// Builder for [`RemoteDelegate`].
pub struct RemoteDelegateBuilder {
    name: String,
    base_url: String,
    method: RemoteMethod,
    transport: Option<Arc<dyn RemoteTransport>>,
    cache_capacity: u64,
    cache_ttl: Duration,
    default_language: Option<String>,
    system_languages: Vec<String>,
    score_options: ScoreOptions,
    default_types: Vec<Arc<EntityType>>,
}

impl RemoteDelegateBuilder {
    fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            method: RemoteMethod::default(),
            transport: None,
            cache_capacity: ResultCache::DEFAULT_CAPACITY,
            cache_ttl: ResultCache::DEFAULT_TTL,
            default_language: None,
            system_languages: Vec::new(),
            score_options: ScoreOptions::IDENTITY,
            default_types: Vec::new(),
        }
    }

    /// How the query batch travels to the remote service.
    pub fn method(mut self, method: RemoteMethod) -> Self {
        self.method = method;
        self
    }

    /// Replaces the default HTTP transport; tests script a mock here.
    pub fn transport(mut self, transport: Arc<dyn RemoteTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Result cache sizing. Capacity `0` disables caching.
    pub fn cache(mut self, capacity: u64, ttl: Duration) -> Self {
        self.cache_capacity = capacity;
        self.cache_ttl = ttl;
        self
    }

    pub fn default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = Some(language.into());
        self
    }

    pub fn system_languages<I, T>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.system_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Linear adjustment rescaling the remote service's scores to local
    /// conventions.
    pub fn score_options(mut self, options: ScoreOptions) -> Self {
        self.score_options = options;
        self
    }

    pub fn default_types(mut self, types: Vec<Arc<EntityType>>) -> Self {
        self.default_types = types;
        self
    }

    pub fn build(self) -> Result<RemoteDelegate, ConfigError> {
        let base_url = self.base_url.trim().to_string();
        if base_url.is_empty() {
            return Err(ConfigError::InvalidResolver {
                reason: "remote base URL must not be empty".to_string(),
            });
        }

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));
        let source = RemoteSource::new(base_url.clone(), self.method, Arc::clone(&transport));

        let mut builder = SingleSourceResolver::builder(self.name, source)
            .kind(ResolverKind::Remote)
            .cache(self.cache_capacity, self.cache_ttl)
            .score_options(self.score_options)
            .default_types(self.default_types)
            .system_languages(self.system_languages);
        if let Some(language) = self.default_language {
            builder = builder.default_language(language);
        }

        Ok(RemoteDelegate {
            inner: builder.build()?,
            manifest: Arc::new(ManifestCache::new(base_url)),
            transport,
        })
    }
}

/// Labels from the remote service's `labels` endpoint.
///
/// Degrades to an empty answer when the manifest is unavailable or does not
/// advertise the endpoint; errors from an advertised endpoint propagate.
pub struct RemoteLabelService {
    manifest: Arc<ManifestCache>,
    transport: Arc<dyn RemoteTransport>,
}

#[async_trait]
impl LabelSource for RemoteLabelService {
    async fn labels(
        &self,
        ids: &[EntityId],
        languages: &LanguagePreference,
        _context: &CallContext,
    ) -> Result<HashMap<EntityId, Option<String>>, SourceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let Some(url) =
            advertised_endpoint(&self.manifest, self.transport.as_ref(), "labels", |c| {
                c.labels_url.clone()
            })
            .await
        else {
            return Ok(HashMap::new());
        };
        fetch_literal_map(self.transport.as_ref(), &url, ids, languages).await
    }
}

/// Descriptions from the remote service's `descriptions` endpoint.
pub struct RemoteDescriptionService {
    manifest: Arc<ManifestCache>,
    transport: Arc<dyn RemoteTransport>,
}

#[async_trait]
impl DescriptionSource for RemoteDescriptionService {
    async fn descriptions(
        &self,
        ids: &[EntityId],
        languages: &LanguagePreference,
        _context: &CallContext,
    ) -> Result<HashMap<EntityId, Option<String>>, SourceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let Some(url) =
            advertised_endpoint(&self.manifest, self.transport.as_ref(), "descriptions", |c| {
                c.descriptions_url.clone()
            })
            .await
        else {
            return Ok(HashMap::new());
        };
        fetch_literal_map(self.transport.as_ref(), &url, ids, languages).await
    }
}

/// Type tags from the remote service's `types` endpoint.
pub struct RemoteTypeService {
    manifest: Arc<ManifestCache>,
    transport: Arc<dyn RemoteTransport>,
}

#[async_trait]
impl TypeSource for RemoteTypeService {
    async fn types_of(
        &self,
        ids: &[EntityId],
        _context: &CallContext,
    ) -> Result<HashMap<EntityId, Vec<TypeRef>>, SourceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let Some(url) =
            advertised_endpoint(&self.manifest, self.transport.as_ref(), "types", |c| {
                c.types_url.clone()
            })
            .await
        else {
            return Ok(HashMap::new());
        };

        let params = vec![("ids".to_string(), join_ids(ids))];
        let value = self
            .transport
            .get(&url, &params)
            .await
            .map_err(to_source_error)?;
        let found: HashMap<String, Vec<WireType>> = serde_json::from_value(value)
            .map_err(|error| SourceError::malformed(error.to_string()))?;
        Ok(found
            .into_iter()
            .map(|(id, types)| {
                let types = types.into_iter().map(WireType::into_type_ref).collect();
                (EntityId::new(id), types)
            })
            .collect())
    }
}

/// Endpoint `select`ed from the capabilities, or `None` when the capability
/// is degraded (manifest unavailable or endpoint not advertised).
async fn advertised_endpoint(
    manifest: &ManifestCache,
    transport: &dyn RemoteTransport,
    kind: &str,
    select: impl Fn(&RemoteCapabilities) -> Option<String>,
) -> Option<String> {
    match manifest.get(transport).await {
        Ok(capabilities) => {
            let url = select(&capabilities);
            if url.is_none() {
                debug!(kind, "remote service advertises no such endpoint");
            }
            url
        }
        Err(error) => {
            debug!(kind, error = %error, "capability degraded: manifest unavailable");
            None
        }
    }
}

async fn fetch_literal_map(
    transport: &dyn RemoteTransport,
    url: &str,
    ids: &[EntityId],
    languages: &LanguagePreference,
) -> Result<HashMap<EntityId, Option<String>>, SourceError> {
    let params = vec![
        ("ids".to_string(), join_ids(ids)),
        ("lang".to_string(), languages.primary().to_string()),
    ];
    let value = transport.get(url, &params).await.map_err(to_source_error)?;
    let found: HashMap<String, Option<String>> =
        serde_json::from_value(value).map_err(|error| SourceError::malformed(error.to_string()))?;
    Ok(found
        .into_iter()
        .map(|(id, text)| (EntityId::new(id), text))
        .collect())
}

fn join_ids(ids: &[EntityId]) -> String {
    ids.iter()
        .map(EntityId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
