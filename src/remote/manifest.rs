//! Remote service capability discovery.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::model::TypeRef;
use crate::protocol::{ManifestDoc, WireType};
use crate::resolver::ResolveError;

use super::transport::RemoteTransport;

/// What a remote reconciliation service told us it can do.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCapabilities {
    pub name: Option<String>,
    pub identifier_space: Option<String>,
    pub schema_space: Option<String>,
    pub default_types: Vec<TypeRef>,
    /// Absolute label endpoint, when the manifest advertises one.
    pub labels_url: Option<String>,
    pub descriptions_url: Option<String>,
    pub types_url: Option<String>,
}

impl RemoteCapabilities {
    fn from_manifest(manifest: ManifestDoc, base_url: &str) -> Self {
        let services = manifest.services.unwrap_or_default();
        Self {
            name: manifest.name,
            identifier_space: manifest.identifier_space,
            schema_space: manifest.schema_space,
            default_types: manifest
                .default_types
                .into_iter()
                .map(WireType::into_type_ref)
                .collect(),
            labels_url: services
                .labels
                .as_deref()
                .map(|target| resolve_url(base_url, target)),
            descriptions_url: services
                .descriptions
                .as_deref()
                .map(|target| resolve_url(base_url, target)),
            types_url: services
                .types
                .as_deref()
                .map(|target| resolve_url(base_url, target)),
        }
    }
}

enum ManifestState {
    Unfetched,
    Available(Arc<RemoteCapabilities>),
    Unavailable { reason: String },
}

/// Lazily-fetched, process-lifetime memo of a remote service's manifest.
///
/// The first caller fetches under an async lock; concurrent first callers
/// wait and reuse that outcome. Failure is memoized the same way success is
/// and is only retried through an explicit [`reload`](Self::reload).
pub struct ManifestCache {
    base_url: String,
    state: Mutex<ManifestState>,
}

impl std::fmt::Debug for ManifestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestCache")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ManifestCache {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state: Mutex::new(ManifestState::Unfetched),
        }
    }

    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The remote capabilities, fetching the manifest on first use.
    pub async fn get(
        &self,
        transport: &dyn RemoteTransport,
    ) -> Result<Arc<RemoteCapabilities>, ResolveError> {
        let mut state = self.state.lock().await;
        match &*state {
            ManifestState::Available(capabilities) => Ok(Arc::clone(capabilities)),
            ManifestState::Unavailable { reason } => Err(ResolveError::ManifestUnavailable {
                url: self.base_url.clone(),
                reason: reason.clone(),
            }),
            ManifestState::Unfetched => match self.fetch(transport).await {
                Ok(capabilities) => {
                    let capabilities = Arc::new(capabilities);
                    *state = ManifestState::Available(Arc::clone(&capabilities));
                    info!(url = %self.base_url, "remote manifest loaded");
                    Ok(capabilities)
                }
                Err(reason) => {
                    warn!(url = %self.base_url, reason = %reason, "remote manifest unavailable");
                    *state = ManifestState::Unavailable {
                        reason: reason.clone(),
                    };
                    Err(ResolveError::ManifestUnavailable {
                        url: self.base_url.clone(),
                        reason,
                    })
                }
            },
        }
    }

    /// Forgets the memoized outcome; the next [`get`](Self::get) refetches.
    pub async fn reload(&self) {
        *self.state.lock().await = ManifestState::Unfetched;
    }

    async fn fetch(&self, transport: &dyn RemoteTransport) -> Result<RemoteCapabilities, String> {
        let value = transport
            .get(&self.base_url, &[])
            .await
            .map_err(|error| error.to_string())?;
        let manifest: ManifestDoc =
            serde_json::from_value(value).map_err(|error| error.to_string())?;
        Ok(RemoteCapabilities::from_manifest(manifest, &self.base_url))
    }
}

/// Resolves a manifest-advertised service target against the manifest's
/// base URL. Absolute targets win; relative targets are joined below the
/// base, treating the base as a directory.
pub(crate) fn resolve_url(base: &str, target: &str) -> String {
    if reqwest::Url::parse(target).is_ok() {
        return target.to_string();
    }

    let mut base_dir = base.to_string();
    if !base_dir.ends_with('/') {
        base_dir.push('/');
    }
    match reqwest::Url::parse(&base_dir).and_then(|url| url.join(target)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => format!("{}{}", base_dir, target.trim_start_matches('/')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url_joins_relative_targets() {
        assert_eq!(
            resolve_url("https://example.org/recon", "labels"),
            "https://example.org/recon/labels"
        );
        assert_eq!(
            resolve_url("https://example.org/recon/", "labels"),
            "https://example.org/recon/labels"
        );
    }

    #[test]
    fn test_resolve_url_keeps_absolute_targets() {
        assert_eq!(
            resolve_url("https://example.org/recon", "https://aux.example.org/labels"),
            "https://aux.example.org/labels"
        );
    }

    #[test]
    fn test_resolve_url_falls_back_on_unparseable_base() {
        assert_eq!(resolve_url("not a url", "labels"), "not a url/labels");
    }
}
