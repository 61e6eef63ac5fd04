//! The federation coordinator: bounded concurrent fan-out over members.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::ConfigError;
use crate::model::{CallContext, Candidate, EntityType, Request, Response};
use crate::resolver::{ResolveError, ResolveResult, Resolver, ResolverKind};
use crate::scoring::ScoreOptions;

use super::{FederationConfig, FederationMember, TimeoutPolicy};

/// What one member task came back with.
enum MemberOutcome {
    Completed(ResolveResult<Vec<Candidate>>),
    TimedOut,
}

/// Resolver that merges the results of an ordered list of member resolvers.
///
/// Members run concurrently, at most [`FederationConfig::max_parallelism`] at
/// a time, all under one wall-clock budget. The merged candidate list is the
/// member-order concatenation of every successful member's candidates; no
/// cross-member re-ranking or dedup happens here. A member that is itself a
/// federation is skipped at dispatch to keep fan-out from recursing.
pub struct FederatedResolver {
    name: String,
    members: Vec<FederationMember>,
    config: FederationConfig,
    default_types: Vec<Arc<EntityType>>,
}

impl std::fmt::Debug for FederatedResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedResolver")
            .field("name", &self.name)
            .field("members", &self.members)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FederatedResolver {
    /// Starts a builder for a federation named `name`.
    pub fn builder(name: impl Into<String>) -> FederatedResolverBuilder {
        FederatedResolverBuilder::new(name)
    }

    #[inline]
    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    /// Members in dispatch order.
    pub fn members(&self) -> &[FederationMember] {
        &self.members
    }

    /// Members eligible for dispatch. Nested federations are dropped here so
    /// a mis-configured membership graph cannot fan out recursively.
    fn eligible(&self) -> Vec<&FederationMember> {
        self.members
            .iter()
            .filter(|member| {
                if member.resolver.kind() == ResolverKind::Federation {
                    warn!(
                        member = member.resolver.name(),
                        "skipping nested federation member"
                    );
                    return false;
                }
                true
            })
            .collect()
    }

    async fn fan_out(
        &self,
        members: &[&FederationMember],
        request: &Request,
        context: &CallContext,
    ) -> ResolveResult<Response> {
        let parallelism = self.config.max_parallelism.min(members.len());
        let deadline = Instant::now() + self.config.timeout;
        debug!(
            members = members.len(),
            parallelism,
            budget_ms = self.config.timeout.as_millis() as u64,
            "dispatching federation members"
        );

        // Each task spawns its member when the stream first polls it, so at
        // most `parallelism` members are in flight at once. All tasks share
        // one deadline: a member still running at the deadline resolves to
        // `TimedOut` instead of holding the batch open.
        let tasks: Vec<_> = members
            .iter()
            .map(|member| {
                let resolver = Arc::clone(&member.resolver);
                let score_options = member.score_options;
                let request = request.clone();
                let context = context.clone();
                async move {
                    tokio::spawn(run_member(
                        resolver,
                        score_options,
                        request,
                        context,
                        deadline,
                    ))
                    .await
                }
            })
            .collect();

        let outcomes: Vec<_> = stream::iter(tasks).buffered(parallelism).collect().await;

        let mut merged: Vec<Candidate> = Vec::new();
        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut timed_out = 0usize;

        for (member, outcome) in members.iter().zip(outcomes) {
            match outcome {
                Ok(MemberOutcome::Completed(Ok(candidates))) => {
                    completed += 1;
                    merged.extend(candidates);
                }
                Ok(MemberOutcome::Completed(Err(error))) => {
                    failed += 1;
                    warn!(
                        member = member.resolver.name(),
                        error = %error,
                        "federation member failed; dropping its contribution"
                    );
                }
                Ok(MemberOutcome::TimedOut) => {
                    timed_out += 1;
                    warn!(
                        member = member.resolver.name(),
                        "federation member missed the batch deadline"
                    );
                }
                Err(join_error) => {
                    return Err(ResolveError::Orchestration {
                        reason: join_error.to_string(),
                    });
                }
            }
        }

        if timed_out > 0 && self.config.on_timeout == TimeoutPolicy::Fail {
            return Err(ResolveError::Timeout {
                budget_ms: self.config.timeout.as_millis() as u64,
            });
        }

        info!(
            completed,
            failed,
            timed_out,
            candidates = merged.len(),
            "federated resolution complete"
        );
        Ok(Response::new(request.id.clone(), merged))
    }
}

async fn run_member(
    resolver: Arc<dyn Resolver>,
    score_options: Option<ScoreOptions>,
    request: Request,
    context: CallContext,
    deadline: Instant,
) -> MemberOutcome {
    match tokio::time::timeout_at(deadline, resolver.resolve(&request, &context)).await {
        Ok(Ok(mut response)) => {
            if let Some(options) = score_options {
                options.apply(&mut response.candidates);
            }
            MemberOutcome::Completed(Ok(response.candidates))
        }
        Ok(Err(error)) => MemberOutcome::Completed(Err(error)),
        Err(_) => MemberOutcome::TimedOut,
    }
}

#[async_trait]
impl Resolver for FederatedResolver {
    #[instrument(
        skip(self, request, context),
        fields(resolver = %self.name, query_id = %request.id)
    )]
    async fn resolve(&self, request: &Request, context: &CallContext) -> ResolveResult<Response> {
        let eligible = self.eligible();

        match eligible.as_slice() {
            [] => {
                debug!("federation has no eligible members");
                Ok(Response::empty(request.id.clone()))
            }
            [member] => {
                let mut response = member.resolver.resolve(request, context).await?;
                if let Some(options) = member.score_options {
                    options.apply(&mut response.candidates);
                }
                Ok(response)
            }
            members => self.fan_out(members, request, context).await,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResolverKind {
        ResolverKind::Federation
    }

    /// Explicitly configured types, or the deduplicated union of what the
    /// members advertise.
    fn default_types(&self) -> Vec<Arc<EntityType>> {
        if !self.default_types.is_empty() {
            return self.default_types.clone();
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut union = Vec::new();
        for member in &self.members {
            for entity_type in member.resolver.default_types() {
                if seen.insert(entity_type.id().to_string()) {
                    union.push(entity_type);
                }
            }
        }
        union
    }
}

/// Builder for [`FederatedResolver`].
pub struct FederatedResolverBuilder {
    name: String,
    members: Vec<FederationMember>,
    config: FederationConfig,
    default_types: Vec<Arc<EntityType>>,
}

impl FederatedResolverBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            config: FederationConfig::default(),
            default_types: Vec::new(),
        }
    }

    /// Appends a member with no score adjustment.
    pub fn member(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.members.push(FederationMember::new(resolver));
        self
    }

    /// Appends a member whose candidates get `options` applied.
    pub fn member_with_options(
        mut self,
        resolver: Arc<dyn Resolver>,
        options: ScoreOptions,
    ) -> Self {
        self.members
            .push(FederationMember::with_score_options(resolver, options));
        self
    }

    pub fn config(mut self, config: FederationConfig) -> Self {
        self.config = config;
        self
    }

    /// Types advertised for discovery instead of the member union.
    pub fn default_types(mut self, types: Vec<Arc<EntityType>>) -> Self {
        self.default_types = types;
        self
    }

    pub fn build(self) -> Result<FederatedResolver, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::InvalidResolver {
                reason: "federation name must not be empty".to_string(),
            });
        }
        if self.config.max_parallelism == 0 {
            return Err(ConfigError::ZeroParallelism {
                name: "max_parallelism",
            });
        }

        Ok(FederatedResolver {
            name,
            members: self.members,
            config: self.config,
            default_types: self.default_types,
        })
    }
}
