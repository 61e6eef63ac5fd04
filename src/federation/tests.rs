use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::{CallContext, Candidate, EntityType, Query, Request, Response};
use crate::resolver::{ResolveError, ResolveResult, Resolver, ResolverKind};
use crate::scoring::ScoreOptions;

use super::{FederatedResolver, FederationConfig, TimeoutPolicy};

/// Tracks how many member resolutions overlap in time.
#[derive(Default)]
struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct StubResolver {
    name: String,
    kind: ResolverKind,
    candidates: Vec<Candidate>,
    types: Vec<Arc<EntityType>>,
    delay: Option<Duration>,
    fails: bool,
    panics: bool,
    calls: AtomicUsize,
    seen_principal: Mutex<Option<String>>,
    gauge: Option<Arc<InFlightGauge>>,
}

fn stub(name: &str, candidates: Vec<Candidate>) -> StubResolver {
    StubResolver {
        name: name.to_string(),
        kind: ResolverKind::Single,
        candidates,
        types: Vec::new(),
        delay: None,
        fails: false,
        panics: false,
        calls: AtomicUsize::new(0),
        seen_principal: Mutex::new(None),
        gauge: None,
    }
}

#[async_trait]
impl Resolver for StubResolver {
    async fn resolve(&self, request: &Request, context: &CallContext) -> ResolveResult<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_principal.lock() = context.principal.clone();

        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gauge) = &self.gauge {
            gauge.exit();
        }

        if self.panics {
            panic!("stub resolver panicked");
        }
        if self.fails {
            return Err(ResolveError::Search {
                resolver: self.name.clone(),
                reason: "backend offline".to_string(),
            });
        }
        Ok(Response::new(request.id.clone(), self.candidates.clone()))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResolverKind {
        self.kind
    }

    fn default_types(&self) -> Vec<Arc<EntityType>> {
        self.types.clone()
    }
}

fn candidate(id: &str, score: f64) -> Candidate {
    Candidate::new(id, score)
}

fn request() -> Request {
    Request::new("q0", Query::new("Berlin"))
}

fn ids(response: &Response) -> Vec<&str> {
    response
        .candidates
        .iter()
        .map(|candidate| candidate.id.as_str())
        .collect()
}

#[tokio::test]
async fn test_no_members_yields_empty_response() {
    let federation = FederatedResolver::builder("empty")
        .build()
        .expect("valid federation");

    let response = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect("resolution");

    assert_eq!(response.id, "q0");
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_single_member_passes_through_with_its_options() {
    let member = Arc::new(stub("solo", vec![candidate("a:1", 0.5)]));
    let federation = FederatedResolver::builder("f")
        .member_with_options(Arc::clone(&member) as Arc<dyn Resolver>, ScoreOptions::new(2.0, 0.0))
        .build()
        .expect("valid federation");

    let response = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect("resolution");

    assert_eq!(ids(&response), vec!["a:1"]);
    assert!((response.candidates[0].score - 1.0).abs() < 1e-12);
    assert_eq!(member.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_single_member_failure_propagates() {
    let mut failing = stub("solo", Vec::new());
    failing.fails = true;

    let federation = FederatedResolver::builder("f")
        .member(Arc::new(failing))
        .build()
        .expect("valid federation");

    let error = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect_err("should fail");
    assert!(matches!(error, ResolveError::Search { .. }));
}

#[tokio::test]
async fn test_merge_keeps_member_order_and_drops_failures() {
    let first = Arc::new(stub(
        "first",
        vec![candidate("a:1", 0.9), candidate("a:2", 0.8)],
    ));
    let mut second = stub("second", vec![candidate("b:1", 0.95)]);
    second.fails = true;
    let second = Arc::new(second);
    let third = Arc::new(stub("third", vec![candidate("c:1", 0.7)]));

    let federation = FederatedResolver::builder("f")
        .member(Arc::clone(&first) as Arc<dyn Resolver>)
        .member(Arc::clone(&second) as Arc<dyn Resolver>)
        .member(Arc::clone(&third) as Arc<dyn Resolver>)
        .build()
        .expect("valid federation");

    let response = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect("resolution");

    assert_eq!(ids(&response), vec!["a:1", "a:2", "c:1"]);
    // The failing member ran and its siblings were unaffected.
    assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    assert_eq!(third.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_merge_order_is_member_order_not_completion_order() {
    let mut slow = stub("slow", vec![candidate("a:1", 0.2)]);
    slow.delay = Some(Duration::from_millis(80));

    let federation = FederatedResolver::builder("f")
        .member(Arc::new(slow))
        .member(Arc::new(stub("fast", vec![candidate("b:1", 0.9)])))
        .build()
        .expect("valid federation");

    let response = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect("resolution");

    assert_eq!(ids(&response), vec!["a:1", "b:1"]);
}

#[tokio::test]
async fn test_nested_federation_members_are_skipped() {
    let mut inner = stub("inner", vec![candidate("n:1", 0.9)]);
    inner.kind = ResolverKind::Federation;
    let inner = Arc::new(inner);
    let plain = Arc::new(stub("plain", vec![candidate("p:1", 0.8)]));

    let federation = FederatedResolver::builder("outer")
        .member(Arc::clone(&inner) as Arc<dyn Resolver>)
        .member(Arc::clone(&plain) as Arc<dyn Resolver>)
        .build()
        .expect("valid federation");

    let response = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect("resolution");

    assert_eq!(ids(&response), vec!["p:1"]);
    assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_partial_policy_merges_what_finished_in_time() {
    let mut slow = stub("slow", vec![candidate("b:1", 0.9)]);
    slow.delay = Some(Duration::from_secs(5));

    let federation = FederatedResolver::builder("f")
        .member(Arc::new(stub("fast", vec![candidate("a:1", 0.8)])))
        .member(Arc::new(slow))
        .config(FederationConfig {
            max_parallelism: 8,
            timeout: Duration::from_millis(50),
            on_timeout: TimeoutPolicy::Partial,
        })
        .build()
        .expect("valid federation");

    let response = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect("resolution");

    assert_eq!(ids(&response), vec!["a:1"]);
}

#[tokio::test]
async fn test_fail_policy_turns_deadline_into_timeout_error() {
    let mut slow = stub("slow", vec![candidate("b:1", 0.9)]);
    slow.delay = Some(Duration::from_secs(5));

    let federation = FederatedResolver::builder("f")
        .member(Arc::new(stub("fast", vec![candidate("a:1", 0.8)])))
        .member(Arc::new(slow))
        .config(FederationConfig {
            max_parallelism: 8,
            timeout: Duration::from_millis(50),
            on_timeout: TimeoutPolicy::Fail,
        })
        .build()
        .expect("valid federation");

    let error = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect_err("should time out");

    assert!(matches!(error, ResolveError::Timeout { budget_ms: 50 }));
    assert!(error.is_timeout());
}

#[tokio::test]
async fn test_member_options_apply_to_that_member_only() {
    let federation = FederatedResolver::builder("f")
        .member_with_options(
            Arc::new(stub("boosted", vec![candidate("a:1", 0.5)])),
            ScoreOptions::new(2.0, 0.0),
        )
        .member(Arc::new(stub("plain", vec![candidate("b:1", 0.5)])))
        .build()
        .expect("valid federation");

    let response = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect("resolution");

    assert!((response.candidates[0].score - 1.0).abs() < 1e-12);
    assert!((response.candidates[1].score - 0.5).abs() < 1e-12);
}

#[tokio::test]
async fn test_parallelism_is_bounded() {
    let gauge = Arc::new(InFlightGauge::default());
    let mut builder = FederatedResolver::builder("f").config(FederationConfig {
        max_parallelism: 1,
        timeout: Duration::from_secs(10),
        on_timeout: TimeoutPolicy::Partial,
    });
    for index in 0..4 {
        let mut member = stub(&format!("m{index}"), vec![candidate("a:1", 0.5)]);
        member.delay = Some(Duration::from_millis(20));
        member.gauge = Some(Arc::clone(&gauge));
        builder = builder.member(Arc::new(member));
    }
    let federation = builder.build().expect("valid federation");

    let response = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect("resolution");

    assert_eq!(response.candidates.len(), 4);
    assert_eq!(gauge.peak(), 1);
}

#[tokio::test]
async fn test_members_run_concurrently_up_to_the_bound() {
    let gauge = Arc::new(InFlightGauge::default());
    let mut builder = FederatedResolver::builder("f").config(FederationConfig {
        max_parallelism: 4,
        timeout: Duration::from_secs(10),
        on_timeout: TimeoutPolicy::Partial,
    });
    for index in 0..4 {
        let mut member = stub(&format!("m{index}"), vec![candidate("a:1", 0.5)]);
        member.delay = Some(Duration::from_millis(20));
        member.gauge = Some(Arc::clone(&gauge));
        builder = builder.member(Arc::new(member));
    }
    let federation = builder.build().expect("valid federation");

    federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect("resolution");

    assert_eq!(gauge.peak(), 4);
}

#[tokio::test]
async fn test_context_reaches_every_member() {
    let first = Arc::new(stub("first", Vec::new()));
    let second = Arc::new(stub("second", Vec::new()));
    let federation = FederatedResolver::builder("f")
        .member(Arc::clone(&first) as Arc<dyn Resolver>)
        .member(Arc::clone(&second) as Arc<dyn Resolver>)
        .build()
        .expect("valid federation");

    federation
        .resolve(&request(), &CallContext::with_principal("tenant-a"))
        .await
        .expect("resolution");

    assert_eq!(first.seen_principal.lock().as_deref(), Some("tenant-a"));
    assert_eq!(second.seen_principal.lock().as_deref(), Some("tenant-a"));
}

#[tokio::test]
async fn test_member_panic_surfaces_as_orchestration_error() {
    let mut bad = stub("bad", Vec::new());
    bad.panics = true;

    let federation = FederatedResolver::builder("f")
        .member(Arc::new(bad))
        .member(Arc::new(stub("good", vec![candidate("a:1", 0.5)])))
        .build()
        .expect("valid federation");

    let error = federation
        .resolve(&request(), &CallContext::anonymous())
        .await
        .expect_err("should fail");
    assert!(matches!(error, ResolveError::Orchestration { .. }));
}

#[test]
fn test_default_types_union_members() {
    let city = Arc::new(EntityType::new("City", Some("City".to_string())));
    let person = Arc::new(EntityType::new("Person", Some("Person".to_string())));
    let place = Arc::new(EntityType::new("Place", None));

    let mut first = stub("first", Vec::new());
    first.types = vec![Arc::clone(&city), Arc::clone(&person)];
    let mut second = stub("second", Vec::new());
    second.types = vec![Arc::clone(&city), Arc::clone(&place)];

    let federation = FederatedResolver::builder("f")
        .member(Arc::new(first))
        .member(Arc::new(second))
        .build()
        .expect("valid federation");

    let types = federation.default_types();
    let type_ids: Vec<&str> = types.iter().map(|entity_type| entity_type.id()).collect();
    assert_eq!(type_ids, vec!["City", "Person", "Place"]);
    assert_eq!(federation.kind(), ResolverKind::Federation);
}

#[test]
fn test_explicit_default_types_win_over_member_union() {
    let mut member = stub("first", Vec::new());
    member.types = vec![Arc::new(EntityType::new("Person", None))];

    let federation = FederatedResolver::builder("f")
        .member(Arc::new(member))
        .default_types(vec![Arc::new(EntityType::new(
            "City",
            Some("City".to_string()),
        ))])
        .build()
        .expect("valid federation");

    let types = federation.default_types();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].id(), "City");
}

#[test]
fn test_builder_rejects_blank_name() {
    let result = FederatedResolver::builder("  ").build();
    assert!(matches!(
        result,
        Err(crate::config::ConfigError::InvalidResolver { .. })
    ));
}

#[test]
fn test_builder_rejects_zero_parallelism() {
    let result = FederatedResolver::builder("f")
        .config(FederationConfig {
            max_parallelism: 0,
            timeout: Duration::from_secs(10),
            on_timeout: TimeoutPolicy::Partial,
        })
        .build();
    assert!(matches!(
        result,
        Err(crate::config::ConfigError::ZeroParallelism { .. })
    ));
}
