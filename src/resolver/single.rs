//! The single-source resolution pipeline.
//!
//! A [`SingleSourceResolver`] wraps one [`EntitySource`] and runs the full
//! pipeline around it: language negotiation, cached single-flight search,
//! same-as aggregation, batched enrichment, label write-through, and score
//! adjustment.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::cache::ResultCache;
use crate::config::ConfigError;
use crate::fingerprint::Fingerprint;
use crate::model::{
    CallContext, Candidate, EntityId, EntityType, LanguagePreference, Query, Request, Response,
    TypeInterner,
};
use crate::sameas::SameAsAggregator;
use crate::scoring::ScoreOptions;

use super::error::{ResolveError, ResolveResult};
use super::source::{DescriptionSource, EntitySource, LabelSink, LabelSource, RawCandidate,
    TypeSource};
use super::{Resolver, ResolverKind};

/// Resolver over one local entity source.
///
/// Built through [`SingleSourceResolver::builder`]; every collaborator
/// besides the source itself is optional.
pub struct SingleSourceResolver<S: EntitySource> {
    name: String,
    kind: ResolverKind,
    source: S,
    cache: ResultCache,
    default_language: Option<String>,
    system_languages: Vec<String>,
    labels: Option<Arc<dyn LabelSource>>,
    descriptions: Option<Arc<dyn DescriptionSource>>,
    types: Option<Arc<dyn TypeSource>>,
    sink: Option<Arc<dyn LabelSink>>,
    aggregator: Option<SameAsAggregator>,
    score_options: ScoreOptions,
    default_types: Vec<Arc<EntityType>>,
}

impl<S: EntitySource> std::fmt::Debug for SingleSourceResolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleSourceResolver")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<S: EntitySource> SingleSourceResolver<S> {
    /// Starts a builder around `source`.
    pub fn builder(name: impl Into<String>, source: S) -> SingleSourceResolverBuilder<S> {
        SingleSourceResolverBuilder::new(name, source)
    }

    /// The result cache, exposed for invalidation and inspection.
    #[inline]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    fn negotiate(&self, query: &Query) -> LanguagePreference {
        LanguagePreference::negotiate(
            &query.languages,
            self.default_language.as_deref(),
            &self.system_languages,
        )
    }

    async fn resolve_uncached(
        &self,
        request: &Request,
        languages: &LanguagePreference,
        context: &CallContext,
    ) -> ResolveResult<Vec<Candidate>> {
        debug!(
            query = %request.query.text,
            languages = ?languages.as_slice(),
            "resolving against source"
        );

        let raw = self
            .source
            .search(request, languages, context)
            .await
            .map_err(|error| ResolveError::Search {
                resolver: self.name.clone(),
                reason: error.to_string(),
            })?;
        debug!(raw = raw.len(), "source search complete");

        let mut interner = TypeInterner::new();
        let mut candidates: Vec<Candidate> = raw
            .into_iter()
            .map(|raw| to_candidate(raw, &mut interner))
            .collect();

        if let Some(aggregator) = &self.aggregator {
            candidates = aggregator.aggregate(candidates, context).await?;
        }

        self.enrich(&mut candidates, &mut interner, languages, context)
            .await?;

        self.score_options.apply(&mut candidates);

        info!(candidates = candidates.len(), "resolution complete");
        Ok(candidates)
    }

    /// Fills missing types, names, and descriptions with one batched
    /// collaborator call per kind, then writes fetched labels through to the
    /// sink.
    async fn enrich(
        &self,
        candidates: &mut [Candidate],
        interner: &mut TypeInterner,
        languages: &LanguagePreference,
        context: &CallContext,
    ) -> ResolveResult<()> {
        if candidates.is_empty() {
            return Ok(());
        }

        if let Some(types) = &self.types {
            let missing: Vec<EntityId> = candidates
                .iter()
                .filter(|candidate| candidate.types.is_empty())
                .map(|candidate| candidate.id.clone())
                .collect();
            if !missing.is_empty() {
                let fetched = types.types_of(&missing, context).await.map_err(|error| {
                    ResolveError::Enrichment {
                        reason: error.to_string(),
                    }
                })?;
                for candidate in candidates.iter_mut() {
                    if !candidate.types.is_empty() {
                        continue;
                    }
                    let Some(refs) = fetched.get(&candidate.id) else {
                        continue;
                    };
                    candidate.types = refs
                        .iter()
                        .map(|type_ref| interner.intern(&type_ref.id, type_ref.name.as_deref()))
                        .collect();
                }
                debug!(requested = missing.len(), "type enrichment complete");
            }
        }

        if let Some(labels) = &self.labels {
            // Candidate names and anonymous type ids ride one batched call.
            let mut wanted: Vec<EntityId> = Vec::new();
            let mut seen: HashSet<EntityId> = HashSet::new();
            for candidate in candidates.iter() {
                if candidate.name.is_none() && seen.insert(candidate.id.clone()) {
                    wanted.push(candidate.id.clone());
                }
            }
            for type_id in interner.unnamed_ids() {
                let id = EntityId::new(type_id);
                if seen.insert(id.clone()) {
                    wanted.push(id);
                }
            }

            if !wanted.is_empty() {
                let found = labels
                    .labels(&wanted, languages, context)
                    .await
                    .map_err(|error| ResolveError::Enrichment {
                        reason: error.to_string(),
                    })?;
                debug!(requested = wanted.len(), found = found.len(), "label enrichment complete");

                for candidate in candidates.iter_mut() {
                    if candidate.name.is_some() {
                        continue;
                    }
                    if let Some(Some(label)) = found.get(&candidate.id) {
                        candidate.name = Some(label.clone());
                    }
                }

                let mut renamed = false;
                for (id, label) in &found {
                    let Some(label) = label else { continue };
                    if interner
                        .get(id.as_str())
                        .is_some_and(|entry| entry.name().is_none())
                    {
                        interner.set_name(id.as_str(), label);
                        renamed = true;
                    }
                }
                if renamed {
                    for candidate in candidates.iter_mut() {
                        candidate.types = candidate
                            .types
                            .iter()
                            .map(|entry| {
                                interner
                                    .get(entry.id())
                                    .unwrap_or_else(|| Arc::clone(entry))
                            })
                            .collect();
                    }
                }

                if let Some(sink) = &self.sink {
                    for (id, label) in &found {
                        if let Some(text) = label {
                            sink.put_label(id, languages.primary(), text);
                        }
                    }
                }
            }
        }

        if let Some(descriptions) = &self.descriptions {
            let wanted: Vec<EntityId> = candidates
                .iter()
                .filter(|candidate| candidate.description.is_none())
                .map(|candidate| candidate.id.clone())
                .collect();
            if !wanted.is_empty() {
                let found = descriptions
                    .descriptions(&wanted, languages, context)
                    .await
                    .map_err(|error| ResolveError::Enrichment {
                        reason: error.to_string(),
                    })?;

                for candidate in candidates.iter_mut() {
                    if candidate.description.is_some() {
                        continue;
                    }
                    if let Some(Some(text)) = found.get(&candidate.id) {
                        candidate.description = Some(text.clone());
                    }
                }

                if let Some(sink) = &self.sink {
                    for (id, text) in &found {
                        if let Some(text) = text {
                            sink.put_description(id, languages.primary(), text);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<S: EntitySource> Resolver for SingleSourceResolver<S> {
    #[instrument(
        skip(self, request, context),
        fields(resolver = %self.name, query_id = %request.id)
    )]
    async fn resolve(&self, request: &Request, context: &CallContext) -> ResolveResult<Response> {
        let languages = self.negotiate(&request.query);
        let fingerprint = Fingerprint::of(&request.query);

        self.cache
            .resolve(request, fingerprint, || {
                self.resolve_uncached(request, &languages, context)
            })
            .await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResolverKind {
        self.kind
    }

    fn default_types(&self) -> Vec<Arc<EntityType>> {
        self.default_types.clone()
    }
}

fn to_candidate(raw: RawCandidate, interner: &mut TypeInterner) -> Candidate {
    let types = raw
        .types
        .iter()
        .map(|type_ref| interner.intern(&type_ref.id, type_ref.name.as_deref()))
        .collect();
    Candidate {
        id: raw.id,
        name: raw.name,
        types,
        score: raw.score,
        matching: raw.matching,
        description: raw.description,
        dataset: raw.dataset,
        reference: raw.reference,
    }
}

/// Builder for [`SingleSourceResolver`].
pub struct SingleSourceResolverBuilder<S: EntitySource> {
    name: String,
    kind: ResolverKind,
    source: S,
    cache_capacity: u64,
    cache_ttl: Duration,
    default_language: Option<String>,
    system_languages: Vec<String>,
    labels: Option<Arc<dyn LabelSource>>,
    descriptions: Option<Arc<dyn DescriptionSource>>,
    types: Option<Arc<dyn TypeSource>>,
    sink: Option<Arc<dyn LabelSink>>,
    aggregator: Option<SameAsAggregator>,
    score_options: ScoreOptions,
    default_types: Vec<Arc<EntityType>>,
}

impl<S: EntitySource> SingleSourceResolverBuilder<S> {
    fn new(name: impl Into<String>, source: S) -> Self {
        Self {
            name: name.into(),
            kind: ResolverKind::Single,
            source,
            cache_capacity: ResultCache::DEFAULT_CAPACITY,
            cache_ttl: ResultCache::DEFAULT_TTL,
            default_language: None,
            system_languages: Vec::new(),
            labels: None,
            descriptions: None,
            types: None,
            sink: None,
            aggregator: None,
            score_options: ScoreOptions::IDENTITY,
            default_types: Vec::new(),
        }
    }

    /// Overrides the structural kind; the remote delegate builds on this.
    pub(crate) fn kind(mut self, kind: ResolverKind) -> Self {
        self.kind = kind;
        self
    }

    /// Result cache sizing. Capacity `0` disables caching.
    pub fn cache(mut self, capacity: u64, ttl: Duration) -> Self {
        self.cache_capacity = capacity;
        self.cache_ttl = ttl;
        self
    }

    /// Language this resolver prefers when the query names none.
    pub fn default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = Some(language.into());
        self
    }

    /// System-wide fallback language chain.
    pub fn system_languages<I, T>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.system_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn label_source(mut self, labels: Arc<dyn LabelSource>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn description_source(mut self, descriptions: Arc<dyn DescriptionSource>) -> Self {
        self.descriptions = Some(descriptions);
        self
    }

    pub fn type_source(mut self, types: Arc<dyn TypeSource>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn label_sink(mut self, sink: Arc<dyn LabelSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Enables same-as aggregation for this resolver's results.
    pub fn aggregator(mut self, aggregator: SameAsAggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Linear score adjustment applied as the last pipeline stage.
    pub fn score_options(mut self, options: ScoreOptions) -> Self {
        self.score_options = options;
        self
    }

    pub fn default_types(mut self, types: Vec<Arc<EntityType>>) -> Self {
        self.default_types = types;
        self
    }

    /// Convenience for adding one default type.
    pub fn default_type(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.default_types.push(Arc::new(EntityType::new(id, name)));
        self
    }

    pub fn build(self) -> Result<SingleSourceResolver<S>, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::InvalidResolver {
                reason: "resolver name must not be empty".to_string(),
            });
        }

        Ok(SingleSourceResolver {
            name,
            kind: self.kind,
            source: self.source,
            cache: ResultCache::new(self.cache_capacity, self.cache_ttl),
            default_language: self.default_language,
            system_languages: self.system_languages,
            labels: self.labels,
            descriptions: self.descriptions,
            types: self.types,
            sink: self.sink,
            aggregator: self.aggregator,
            score_options: self.score_options,
            default_types: self.default_types,
        })
    }
}
