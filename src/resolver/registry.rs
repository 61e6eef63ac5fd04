//! Name-keyed registry of resolvers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::Resolver;

/// Shared lookup table the service dispatches through.
///
/// Registration is expected at startup but permitted at runtime; reads vastly
/// outnumber writes.
#[derive(Default)]
pub struct LookupRegistry {
    resolvers: RwLock<HashMap<String, Arc<dyn Resolver>>>,
}

impl std::fmt::Debug for LookupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupRegistry")
            .field("resolvers", &self.names())
            .finish()
    }
}

impl LookupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver under its own name, replacing any previous entry.
    ///
    /// Returns the replaced resolver, if there was one.
    pub fn register(&self, resolver: Arc<dyn Resolver>) -> Option<Arc<dyn Resolver>> {
        let name = resolver.name().to_string();
        debug!(resolver = %name, kind = %resolver.kind(), "registering resolver");
        self.resolvers.write().insert(name, resolver)
    }

    /// Looks up a resolver by name.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Resolver>> {
        self.resolvers.read().get(name).map(Arc::clone)
    }

    /// Removes and returns the resolver registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Resolver>> {
        self.resolvers.write().remove(name)
    }

    /// Registered names, sorted for deterministic iteration.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resolvers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of all registered resolvers in name order.
    pub fn all(&self) -> Vec<Arc<dyn Resolver>> {
        let guard = self.resolvers.read();
        let mut entries: Vec<(&String, &Arc<dyn Resolver>)> = guard.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(_, resolver)| Arc::clone(resolver))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resolvers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.read().is_empty()
    }
}
