//! Per-resolver result caching with single-flight resolution.
//!
//! Keyed by query [`Fingerprint`]. Concurrent lookups for the same
//! fingerprint share one in-flight resolution; a failure propagates to every
//! waiter and is not stored, so the next lookup retries.


use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::fingerprint::{Fingerprint, normalize_text};
use crate::model::{Candidate, Request, Response};
use crate::resolver::error::{ResolveError, ResolveResult};

/// A finished resolution stored under its query fingerprint.
///
/// The correlation id of the populating request is kept for diagnostics
/// only; hits are re-keyed to the requesting id.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Correlation id of the request that populated this entry.
    pub origin_id: String,
    /// Normalized query text, for log inspection.
    pub summary: String,
    pub candidates: Vec<Candidate>,
}

impl CacheEntry {
    /// Builds the response for `request_id`, cloning the stored candidates.
    pub fn response_for(&self, request_id: &str) -> Response {
        Response::new(request_id, self.candidates.clone())
    }
}

/// Single-flight result cache. Capacity `0` disables storage entirely.
pub struct ResultCache {
    entries: Option<Cache<Fingerprint, CacheEntry>>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.is_enabled())
            .field("entries", &self.entry_count())
            .finish()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_TTL)
    }
}

impl ResultCache {
    /// Default entry capacity.
    pub const DEFAULT_CAPACITY: u64 = 1024;

    /// Default time-to-live for entries.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

    /// Creates a cache holding up to `capacity` entries for `ttl` each.
    ///
    /// `capacity == 0` builds a disabled cache: every resolution invokes its
    /// loader and nothing is stored.
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        if capacity == 0 {
            return Self::disabled();
        }
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self {
            entries: Some(entries),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { entries: None }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Entries currently stored. May lag behind recent inserts until
    /// [`run_pending_tasks`](Self::run_pending_tasks) has run.
    pub fn entry_count(&self) -> u64 {
        self.entries.as_ref().map_or(0, Cache::entry_count)
    }

    /// Flushes moka's internal maintenance queue. Tests call this before
    /// asserting on [`entry_count`](Self::entry_count).
    pub async fn run_pending_tasks(&self) {
        if let Some(entries) = &self.entries {
            entries.run_pending_tasks().await;
        }
    }

    /// Drops every stored entry.
    pub fn invalidate_all(&self) {
        if let Some(entries) = &self.entries {
            entries.invalidate_all();
            debug!("result cache invalidated");
        }
    }

    /// Returns the cached response for `fingerprint`, or runs `load` to
    /// produce, store, and return it.
    ///
    /// Concurrent callers with the same fingerprint share one `load`
    /// invocation and all receive its outcome.
    pub async fn resolve<F, Fut>(
        &self,
        request: &Request,
        fingerprint: Fingerprint,
        load: F,
    ) -> ResolveResult<Response>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResolveResult<Vec<Candidate>>>,
    {
        let Some(entries) = &self.entries else {
            let candidates = load().await?;
            return Ok(Response::new(request.id.clone(), candidates));
        };

        let entry = entries
            .try_get_with(fingerprint, async {
                debug!(fingerprint = %fingerprint, "cache miss; resolving");
                let candidates = load().await?;
                Ok(CacheEntry {
                    origin_id: request.id.clone(),
                    summary: normalize_text(&request.query.text),
                    candidates,
                })
            })
            .await
            .map_err(|error: Arc<ResolveError>| (*error).clone())?;

        Ok(entry.response_for(&request.id))
    }
}
