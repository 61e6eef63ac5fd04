//! Collaborator contracts a resolver is assembled from.
//!
//! [`EntitySource`] is the generic seam a [`SingleSourceResolver`] is built
//! around; implementations are known at compile time, so it uses a plain
//! `impl Future` method. The enrichment collaborators are optional and held
//! as trait objects, so they use [`async_trait`].
//!
//! [`SingleSourceResolver`]: super::single::SingleSourceResolver

use std::collections::{BTreeSet, HashMap};
use std::future::Future;

use async_trait::async_trait;

use crate::model::{CallContext, EntityId, LanguagePreference, Request, TypeRef};

use super::error::SourceError;

/// A candidate as produced by a backing source, before interning and
/// enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub id: EntityId,
    /// Display name, when the source indexes one.
    pub name: Option<String>,
    /// Type tags, possibly without display names.
    pub types: Vec<TypeRef>,
    /// Source-scale relevance score.
    pub score: f64,
    /// Whether the source considers this a certain match.
    pub matching: bool,
    pub description: Option<String>,
    pub dataset: Option<String>,
    /// Fold target carried through from an upstream aggregation (remote
    /// services may return already-folded candidates).
    pub reference: Option<EntityId>,
}

impl RawCandidate {
    /// Minimal candidate with the given identifier and score.
    pub fn new(id: impl Into<EntityId>, score: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            types: Vec::new(),
            score,
            matching: false,
            description: None,
            dataset: None,
            reference: None,
        }
    }

    pub fn named(id: impl Into<EntityId>, name: impl Into<String>, score: f64) -> Self {
        let mut candidate = Self::new(id, score);
        candidate.name = Some(name.into());
        candidate
    }

    pub fn with_type(mut self, type_ref: TypeRef) -> Self {
        self.types.push(type_ref);
        self
    }

    pub fn with_matching(mut self, matching: bool) -> Self {
        self.matching = matching;
        self
    }
}

/// The search capability a resolver wraps.
///
/// Implementations honor `request.query.limit` themselves; the resolver does
/// not re-truncate.
pub trait EntitySource: Send + Sync {
    /// Searches the backing store for candidates matching the request.
    fn search(
        &self,
        request: &Request,
        languages: &LanguagePreference,
        context: &CallContext,
    ) -> impl Future<Output = Result<Vec<RawCandidate>, SourceError>> + Send;
}

/// Sources are usable through `Arc`, so callers can keep a handle to one
/// they hand off to a resolver.
impl<S: EntitySource> EntitySource for std::sync::Arc<S> {
    fn search(
        &self,
        request: &Request,
        languages: &LanguagePreference,
        context: &CallContext,
    ) -> impl Future<Output = Result<Vec<RawCandidate>, SourceError>> + Send {
        S::search(self, request, languages, context)
    }
}

/// Batched display-name lookup.
#[async_trait]
pub trait LabelSource: Send + Sync {
    /// Returns the best label per requested id in the preferred languages.
    ///
    /// Ids the source knows nothing about may be omitted or mapped to `None`;
    /// both read the same to callers.
    async fn labels(
        &self,
        ids: &[EntityId],
        languages: &LanguagePreference,
        context: &CallContext,
    ) -> Result<HashMap<EntityId, Option<String>>, SourceError>;
}

/// Batched short-description lookup.
#[async_trait]
pub trait DescriptionSource: Send + Sync {
    async fn descriptions(
        &self,
        ids: &[EntityId],
        languages: &LanguagePreference,
        context: &CallContext,
    ) -> Result<HashMap<EntityId, Option<String>>, SourceError>;
}

/// Batched type-tag lookup for candidates whose source carried none.
#[async_trait]
pub trait TypeSource: Send + Sync {
    async fn types_of(
        &self,
        ids: &[EntityId],
        context: &CallContext,
    ) -> Result<HashMap<EntityId, Vec<TypeRef>>, SourceError>;
}

/// Equivalence assertions consulted by same-as aggregation.
#[async_trait]
pub trait SameAsOracle: Send + Sync {
    /// For each id with assertions: the set of ids it is declared equal to
    /// (its would-be primaries). Ids without assertions may be omitted.
    async fn equivalents_of(
        &self,
        ids: &[EntityId],
        context: &CallContext,
    ) -> Result<HashMap<EntityId, BTreeSet<EntityId>>, SourceError>;
}

/// Write-through target for labels and descriptions fetched during
/// enrichment.
///
/// Fire-and-forget: implementations buffer internally and must not block
/// resolution.
pub trait LabelSink: Send + Sync {
    fn put_label(&self, id: &EntityId, language: &str, text: &str);

    fn put_description(&self, id: &EntityId, language: &str, text: &str);
}
