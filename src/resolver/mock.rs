//! Mock collaborators for tests and downstream consumers (behind the `mock`
//! feature).

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::{CallContext, EntityId, LanguagePreference, Request, TypeRef};

use super::error::SourceError;
use super::source::{
    DescriptionSource, EntitySource, LabelSink, LabelSource, RawCandidate, SameAsOracle,
    TypeSource,
};

/// Scripted [`EntitySource`]: returns canned candidates, optionally after a
/// delay, and records what it was asked.
#[derive(Default)]
pub struct MockEntitySource {
    candidates: Mutex<Vec<RawCandidate>>,
    failure: Mutex<Option<SourceError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    last_languages: Mutex<Option<LanguagePreference>>,
    last_context: Mutex<Option<CallContext>>,
}

impl MockEntitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(candidates: Vec<RawCandidate>) -> Self {
        let source = Self::new();
        source.set_candidates(candidates);
        source
    }

    pub fn set_candidates(&self, candidates: Vec<RawCandidate>) {
        *self.candidates.lock() = candidates;
    }

    /// Makes every subsequent search fail until [`clear_failure`](Self::clear_failure).
    pub fn set_failure(&self, reason: impl Into<String>) {
        *self.failure.lock() = Some(SourceError::backend(reason));
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Delays every subsequent search, for timeout and single-flight tests.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Language preference seen by the most recent search.
    pub fn last_languages(&self) -> Option<LanguagePreference> {
        self.last_languages.lock().clone()
    }

    /// Call context seen by the most recent search.
    pub fn last_context(&self) -> Option<CallContext> {
        self.last_context.lock().clone()
    }
}

impl EntitySource for MockEntitySource {
    async fn search(
        &self,
        request: &Request,
        languages: &LanguagePreference,
        context: &CallContext,
    ) -> Result<Vec<RawCandidate>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_languages.lock() = Some(languages.clone());
        *self.last_context.lock() = Some(context.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        let mut candidates = self.candidates.lock().clone();
        if let Some(limit) = request.query.limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }
}

/// Scripted label/description/type collaborator.
///
/// Every requested id gets an entry in the returned map, `None` when nothing
/// was scripted, so tests exercise both shapes of the contract.
#[derive(Default)]
pub struct MockEnrichment {
    labels: Mutex<HashMap<EntityId, String>>,
    descriptions: Mutex<HashMap<EntityId, String>>,
    types: Mutex<HashMap<EntityId, Vec<TypeRef>>>,
    failure: Mutex<Option<SourceError>>,
    label_calls: AtomicUsize,
    description_calls: AtomicUsize,
    type_calls: AtomicUsize,
}

impl MockEnrichment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_label(&self, id: impl Into<EntityId>, text: impl Into<String>) {
        self.labels.lock().insert(id.into(), text.into());
    }

    pub fn insert_description(&self, id: impl Into<EntityId>, text: impl Into<String>) {
        self.descriptions.lock().insert(id.into(), text.into());
    }

    pub fn insert_types(&self, id: impl Into<EntityId>, types: Vec<TypeRef>) {
        self.types.lock().insert(id.into(), types);
    }

    pub fn set_failure(&self, reason: impl Into<String>) {
        *self.failure.lock() = Some(SourceError::unavailable(reason));
    }

    pub fn label_call_count(&self) -> usize {
        self.label_calls.load(Ordering::SeqCst)
    }

    pub fn description_call_count(&self) -> usize {
        self.description_calls.load(Ordering::SeqCst)
    }

    pub fn type_call_count(&self) -> usize {
        self.type_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), SourceError> {
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LabelSource for MockEnrichment {
    async fn labels(
        &self,
        ids: &[EntityId],
        _languages: &LanguagePreference,
        _context: &CallContext,
    ) -> Result<HashMap<EntityId, Option<String>>, SourceError> {
        self.label_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let known = self.labels.lock();
        Ok(ids
            .iter()
            .map(|id| (id.clone(), known.get(id).cloned()))
            .collect())
    }
}

#[async_trait]
impl DescriptionSource for MockEnrichment {
    async fn descriptions(
        &self,
        ids: &[EntityId],
        _languages: &LanguagePreference,
        _context: &CallContext,
    ) -> Result<HashMap<EntityId, Option<String>>, SourceError> {
        self.description_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let known = self.descriptions.lock();
        Ok(ids
            .iter()
            .map(|id| (id.clone(), known.get(id).cloned()))
            .collect())
    }
}

#[async_trait]
impl TypeSource for MockEnrichment {
    async fn types_of(
        &self,
        ids: &[EntityId],
        _context: &CallContext,
    ) -> Result<HashMap<EntityId, Vec<TypeRef>>, SourceError> {
        self.type_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let known = self.types.lock();
        Ok(ids
            .iter()
            .filter_map(|id| known.get(id).map(|types| (id.clone(), types.clone())))
            .collect())
    }
}

/// Scripted [`SameAsOracle`] backed by an in-memory assertion table.
#[derive(Default)]
pub struct MockSameAsOracle {
    links: Mutex<HashMap<EntityId, BTreeSet<EntityId>>>,
    failure: Mutex<Option<SourceError>>,
    calls: AtomicUsize,
}

impl MockSameAsOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asserts `subject sameAs primary`.
    pub fn add_link(&self, subject: impl Into<EntityId>, primary: impl Into<EntityId>) {
        self.links
            .lock()
            .entry(subject.into())
            .or_default()
            .insert(primary.into());
    }

    pub fn set_failure(&self, reason: impl Into<String>) {
        *self.failure.lock() = Some(SourceError::unavailable(reason));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SameAsOracle for MockSameAsOracle {
    async fn equivalents_of(
        &self,
        ids: &[EntityId],
        _context: &CallContext,
    ) -> Result<HashMap<EntityId, BTreeSet<EntityId>>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        let links = self.links.lock();
        Ok(ids
            .iter()
            .filter_map(|id| links.get(id).map(|targets| (id.clone(), targets.clone())))
            .collect())
    }
}

/// Recording [`LabelSink`].
#[derive(Default)]
pub struct MockLabelSink {
    labels: Mutex<Vec<(EntityId, String, String)>>,
    descriptions: Mutex<Vec<(EntityId, String, String)>>,
}

impl MockLabelSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(id, language, text)` label writes, in order.
    pub fn labels(&self) -> Vec<(EntityId, String, String)> {
        self.labels.lock().clone()
    }

    pub fn descriptions(&self) -> Vec<(EntityId, String, String)> {
        self.descriptions.lock().clone()
    }
}

impl LabelSink for MockLabelSink {
    fn put_label(&self, id: &EntityId, language: &str, text: &str) {
        self.labels
            .lock()
            .push((id.clone(), language.to_string(), text.to_string()));
    }

    fn put_description(&self, id: &EntityId, language: &str, text: &str) {
        self.descriptions
            .lock()
            .push((id.clone(), language.to_string(), text.to_string()));
    }
}
