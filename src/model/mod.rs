//! Core domain model shared across resolvers, caches, and the service surface.

pub mod language;


pub use language::{DEFAULT_LANGUAGE, LanguagePreference};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Globally unique entity identifier.
///
/// In RDF-backed deployments this is a full IRI; other backends may use
/// opaque keys. The engine never interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Entity type tag attached to candidates.
///
/// Equality and hashing consider only the identifier: a type fetched with a
/// display name and the same type fetched without one are the same type.
/// Names are negotiated per request, so instances are interned per resolution
/// via [`TypeInterner`] rather than shared globally.
#[derive(Debug, Clone)]
pub struct EntityType {
    id: String,
    name: Option<String>,
}

impl EntityType {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

impl std::hash::Hash for EntityType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Request-scoped intern table for [`EntityType`] instances.
///
/// All candidates in one resolution share a single `Arc<EntityType>` per type
/// identifier. Interning an identifier a second time with a name upgrades the
/// stored instance; `Arc`s issued before the upgrade keep the anonymous
/// instance until the caller rewrites them.
#[derive(Debug, Default)]
pub struct TypeInterner {
    entries: HashMap<String, Arc<EntityType>>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared instance for `id`, creating it on first use.
    pub fn intern(&mut self, id: &str, name: Option<&str>) -> Arc<EntityType> {
        match self.entries.get(id) {
            Some(existing) if existing.name().is_some() || name.is_none() => Arc::clone(existing),
            _ => {
                let entry = Arc::new(EntityType::new(id, name.map(str::to_string)));
                self.entries.insert(id.to_string(), Arc::clone(&entry));
                entry
            }
        }
    }

    /// Shared instance for `id`, if one has been interned.
    pub fn get(&self, id: &str) -> Option<Arc<EntityType>> {
        self.entries.get(id).map(Arc::clone)
    }

    /// Identifiers interned without a display name so far, sorted.
    pub fn unnamed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.name().is_none())
            .map(|entry| entry.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    /// Attaches a display name to an already-interned identifier.
    ///
    /// A name set earlier wins; this only upgrades anonymous entries.
    pub fn set_name(&mut self, id: &str, name: &str) {
        let Some(existing) = self.entries.get_mut(id) else {
            return;
        };
        if existing.name().is_none() {
            *existing = Arc::new(EntityType::new(id, Some(name.to_string())));
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Plain type tag as exchanged with sources and the wire protocol.
///
/// Interned into [`EntityType`] during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub id: String,
    pub name: Option<String>,
}

impl TypeRef {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }
}

/// Value side of a property constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// Free-text value, compared after whitespace normalization.
    Literal(String),
    /// Reference to another entity.
    Entity(EntityId),
}

impl PropertyValue {
    /// Text form used for fingerprinting and wire encoding.
    pub fn as_text(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Entity(id) => id.as_str(),
        }
    }
}

/// One property constraint from a reconciliation query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyConstraint {
    /// Property identifier in the backing source's vocabulary.
    pub pid: String,
    pub value: PropertyValue,
}

impl PropertyConstraint {
    pub fn literal(pid: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            value: PropertyValue::Literal(value.into()),
        }
    }

    pub fn entity(pid: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            pid: pid.into(),
            value: PropertyValue::Entity(id.into()),
        }
    }
}

/// A single reconciliation query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Free-text search term.
    pub text: String,
    /// Optional type restriction (a type identifier).
    pub entity_type: Option<String>,
    /// Maximum number of candidates the source should return.
    pub limit: Option<usize>,
    /// Whether the type restriction is strict. Unset leaves the choice to
    /// the backing source.
    pub type_strict: Option<bool>,
    /// Preferred display languages, most preferred first.
    pub languages: Vec<String>,
    /// Property constraints narrowing the match.
    pub properties: Vec<PropertyConstraint>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entity_type: None,
            limit: None,
            type_strict: None,
            languages: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_type_strict(mut self, strict: bool) -> Self {
        self.type_strict = Some(strict);
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(mut self, property: PropertyConstraint) -> Self {
        self.properties.push(property);
        self
    }
}

/// A query paired with its caller-assigned correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Caller-assigned id (`q0`, `q1`, ...), echoed back on the response.
    pub id: String,
    pub query: Query,
}

impl Request {
    pub fn new(id: impl Into<String>, query: Query) -> Self {
        Self {
            id: id.into(),
            query,
        }
    }
}

/// One scored candidate entity in a reconciliation response.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: EntityId,
    /// Display name in the negotiated language, when known.
    pub name: Option<String>,
    /// Type tags, interned per resolution.
    pub types: Vec<Arc<EntityType>>,
    /// Relevance score; higher is better. Adjusted scores may leave `[0, 1]`.
    pub score: f64,
    /// Whether the source considers this a certain match.
    pub matching: bool,
    /// Short human-readable description, when enriched.
    pub description: Option<String>,
    /// Originating dataset or member tag, for federated responses.
    pub dataset: Option<String>,
    /// Primary this candidate was folded under by same-as aggregation.
    pub reference: Option<EntityId>,
}

impl Candidate {
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

    /// Candidate with an identifier, display name, and score.
    pub fn named(id: impl Into<EntityId>, name: impl Into<String>, score: f64) -> Self {
        let mut candidate = Self::new(id, score);
        candidate.name = Some(name.into());
        candidate
    }
}

/// Candidates for one request, echoing its correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: String,
    pub candidates: Vec<Candidate>,
}

impl Response {
    pub fn new(id: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            id: id.into(),
            candidates,
        }
    }

    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new())
    }

    /// Highest-scoring candidate, if any.
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.iter().max_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Ambient caller information propagated through resolution, including into
/// work spawned on other tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    /// Authenticated principal or tenant, when the transport layer knows one.
    pub principal: Option<String>,
    /// Caller-supplied correlation id, carried into federated members.
    pub trace_id: Option<String>,
}

impl CallContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_principal(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            trace_id: None,
        }
    }
}
