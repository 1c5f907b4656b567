// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dispatch behaviour against scripted in-process handlers.
//!
//! Covers:
//! - Direct and primary-secondary dispatch with context handoff
//! - Hierarchical groups: coordinator first, specialists see its context
//! - Concurrency ceiling across a parallel fan-out
//! - Timeout → single retry with the fallback handler
//! - Failure after retry recorded as an unsuccessful outcome
//! - Cancellation: in-flight handlers abandoned, no outcome recorded

use async_trait::async_trait;
use conductor_core::application::engine::{OutcomeDisposition, RoutingEngine};
use conductor_core::domain::config::{default_catalog, RouterConfigManifest, RouterConfigSpec};
use conductor_core::domain::context::{ContextElement, Importance};
use conductor_core::domain::events::RoutingEvent;
use conductor_core::domain::handler::{
    Handler, HandlerDescriptor, HandlerError, HandlerId, HandlerOutput, HandoffRequest, HandoffRole,
};
use conductor_core::domain::plan::CoordinationStrategy;
use conductor_core::domain::query::Query;
use conductor_core::infrastructure::event_bus::{DomainEvent, EventBus};
use conductor_core::infrastructure::handler_registry::StaticHandlerRegistry;
use conductor_core::infrastructure::relationship_store::InMemoryRelationshipRepository;
use conductor_cortex::{InMemoryPatternRepository, LearningService, StandardLearningService};
use conductor_swarm::{DispatchError, InvocationStatus, PlanDispatcher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Sleep(Duration),
    AwaitCancel,
}

/// What a handler saw on one invocation
#[derive(Debug, Clone)]
struct Seen {
    handler: String,
    role: HandoffRole,
    context_keys: Vec<String>,
}

#[derive(Default)]
struct InvocationTracker {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<Seen>>,
}

impl InvocationTracker {
    fn seen_by(&self, handler: &str) -> Vec<Seen> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.handler == handler)
            .cloned()
            .collect()
    }
}

struct ScriptedHandler {
    descriptor: HandlerDescriptor,
    behavior: Behavior,
    tracker: Arc<InvocationTracker>,
}

#[async_trait]
impl Handler for ScriptedHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: HandoffRequest) -> Result<HandlerOutput, HandlerError> {
        let id = self.descriptor.id.clone();
        let now = self.tracker.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.peak.fetch_max(now, Ordering::SeqCst);
        self.tracker.seen.lock().unwrap().push(Seen {
            handler: id.to_string(),
            role: request.role,
            context_keys: request.context.elements.iter().map(|e| e.key.clone()).collect(),
        });

        let result = match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(HandlerError::Failed {
                handler: id.clone(),
                reason: "scripted failure".to_string(),
            }),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            Behavior::AwaitCancel => {
                request.cancellation.cancelled().await;
                Err(HandlerError::Cancelled(id.clone()))
            }
        };
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);

        result.map(|()| HandlerOutput {
            summary: format!("{} done", id),
            context: vec![ContextElement::new(format!("{}-notes", id), "findings", Importance::Critical)],
        })
    }
}

struct Harness {
    dispatcher: PlanDispatcher,
    engine: Arc<RoutingEngine>,
    learning: Arc<StandardLearningService>,
    bus: EventBus,
    tracker: Arc<InvocationTracker>,
}

fn catalog_descriptor(id: &str) -> HandlerDescriptor {
    default_catalog()
        .into_iter()
        .find(|d| d.id.as_str() == id)
        .unwrap_or_else(|| HandlerDescriptor::new(id, id))
}

fn harness(spec: RouterConfigSpec, handlers: &[(&str, Behavior, Option<Duration>)]) -> Harness {
    let tracker = Arc::new(InvocationTracker::default());
    let mut registry = StaticHandlerRegistry::from_config(&spec.registry);
    for (id, behavior, timeout) in handlers {
        let mut descriptor = catalog_descriptor(id);
        descriptor.limits.timeout = *timeout;
        descriptor.limits.max_concurrency = 4;
        registry = registry.with_handler(Arc::new(ScriptedHandler {
            descriptor,
            behavior: *behavior,
            tracker: tracker.clone(),
        }));
    }

    let bus = EventBus::new(1024);
    let learning = Arc::new(StandardLearningService::new(
        Arc::new(InMemoryPatternRepository::new()),
        Arc::new(bus.clone()),
    ));
    let engine = Arc::new(
        RoutingEngine::new(
            &spec,
            Arc::new(registry),
            learning.clone(),
            Arc::new(InMemoryRelationshipRepository::seeded(&spec.relationships.seed)),
            bus.clone(),
        )
        .unwrap(),
    );

    Harness {
        dispatcher: PlanDispatcher::new(engine.clone()),
        engine,
        learning,
        bus,
        tracker,
    }
}

fn all_succeed() -> Vec<(&'static str, Behavior, Option<Duration>)> {
    [
        "security-expert",
        "performance-expert",
        "testing-expert",
        "container-expert",
        "debugging-expert",
        "architecture-expert",
        "database-expert",
        "coordinator",
        "general",
    ]
    .into_iter()
    .map(|id| (id, Behavior::Succeed, None))
    .collect()
}

fn replace(
    mut handlers: Vec<(&'static str, Behavior, Option<Duration>)>,
    id: &str,
    behavior: Behavior,
    timeout: Option<Duration>,
) -> Vec<(&'static str, Behavior, Option<Duration>)> {
    for entry in handlers.iter_mut() {
        if entry.0 == id {
            entry.1 = behavior;
            entry.2 = timeout;
        }
    }
    handlers
}

fn outcome_events(bus_events: &mut conductor_core::infrastructure::event_bus::EventReceiver) -> Vec<bool> {
    let mut outcomes = Vec::new();
    while let Ok(event) = bus_events.try_recv() {
        if let DomainEvent::Routing(RoutingEvent::OutcomeReported { success, .. }) = event {
            outcomes.push(success);
        }
    }
    outcomes
}

#[tokio::test]
async fn test_direct_dispatch_records_success() {
    let h = harness(RouterConfigManifest::default().spec, &all_succeed());
    let query = Query::new("fix failing async test");

    let (plan, report) = h
        .dispatcher
        .route_and_dispatch(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(plan.strategy, CoordinationStrategy::Direct);
    assert!(report.success);
    assert_eq!(report.feedback, OutcomeDisposition::Accepted);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].role, HandoffRole::Sole);
    assert_eq!(report.results[0].attempts, 1);
    assert!(h.learning.lookup(&query.signature).await.unwrap().is_some());
}

#[tokio::test]
async fn test_validator_receives_primary_context() {
    let h = harness(RouterConfigManifest::default().spec, &all_succeed());
    let query = Query::new("debug the crash stack trace panic in the test");

    let (plan, report) = h
        .dispatcher
        .route_and_dispatch(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(plan.strategy, CoordinationStrategy::PrimarySecondary);
    assert!(report.success);

    let validator = h.tracker.seen_by("testing-expert");
    assert_eq!(validator.len(), 1);
    assert_eq!(validator[0].role, HandoffRole::Validator);
    assert!(validator[0].context_keys.contains(&"debugging-expert-notes".to_string()));

    let primary = h.tracker.seen_by("debugging-expert");
    assert_eq!(primary[0].role, HandoffRole::Primary);
    assert!(primary[0].context_keys.is_empty());
}

#[tokio::test]
async fn test_hierarchical_specialists_follow_coordinator() {
    let h = harness(RouterConfigManifest::default().spec, &all_succeed());
    let query = Query::new("secure the login flow without sacrificing performance, a latency versus protection trade-off");

    let (plan, report) = h
        .dispatcher
        .route_and_dispatch(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(plan.strategy, CoordinationStrategy::Hierarchical);
    assert!(report.success);
    assert_eq!(report.results[0].handler, HandlerId::new("coordinator"));
    assert_eq!(report.results[0].role, HandoffRole::Coordinator);

    for specialist in ["security-expert", "performance-expert"] {
        let seen = h.tracker.seen_by(specialist);
        assert_eq!(seen[0].role, HandoffRole::Specialist);
        assert!(seen[0].context_keys.contains(&"coordinator-notes".to_string()));
    }
}

#[tokio::test]
async fn test_parallel_fan_out_respects_ceiling() {
    let mut spec = RouterConfigManifest::default().spec;
    spec.dispatch.max_concurrent_handlers = 2;
    let handlers = all_succeed()
        .into_iter()
        .map(|(id, _, timeout)| (id, Behavior::Sleep(Duration::from_millis(30)), timeout))
        .collect::<Vec<_>>();
    let h = harness(spec, &handlers);

    let (plan, report) = h
        .dispatcher
        .route_and_dispatch(
            &Query::new("container security testing with performance monitoring"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(plan.strategy, CoordinationStrategy::Parallel);
    assert_eq!(report.results.len(), 4);
    assert!(report.success);
    assert!(report.results.iter().all(|r| r.role == HandoffRole::ParallelMember));
    assert!(h.tracker.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(h.dispatcher.available_permits(), 2);
}

#[tokio::test]
async fn test_timeout_retries_with_fallback() {
    let handlers = replace(
        all_succeed(),
        "testing-expert",
        Behavior::Sleep(Duration::from_millis(500)),
        Some(Duration::from_millis(20)),
    );
    let h = harness(RouterConfigManifest::default().spec, &handlers);

    let (_, report) = h
        .dispatcher
        .route_and_dispatch(&Query::new("fix failing async test"), &CancellationToken::new())
        .await
        .unwrap();

    let slot = &report.results[0];
    assert_eq!(slot.handler, HandlerId::new("testing-expert"));
    assert_eq!(slot.served_by, HandlerId::new("general"));
    assert_eq!(slot.attempts, 2);
    assert_eq!(slot.status, InvocationStatus::Succeeded);
    assert!(slot.used_fallback());
    assert!(report.success);
}

#[tokio::test]
async fn test_failure_after_retry_is_recorded() {
    let handlers = replace(
        replace(all_succeed(), "testing-expert", Behavior::Fail, None),
        "general",
        Behavior::Fail,
        None,
    );
    let h = harness(RouterConfigManifest::default().spec, &handlers);
    let mut events = h.bus.subscribe();

    let (_, report) = h
        .dispatcher
        .route_and_dispatch(&Query::new("fix failing async test"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert!(!report.is_partial());
    assert_eq!(report.results[0].status, InvocationStatus::Failed);
    assert_eq!(report.results[0].attempts, 2);
    assert!(report.results[0].error.is_some());
    assert_eq!(outcome_events(&mut events), vec![false]);
}

#[tokio::test]
async fn test_retry_disabled_surfaces_first_failure() {
    let mut spec = RouterConfigManifest::default().spec;
    spec.dispatch.retry_once = false;
    let handlers = replace(all_succeed(), "testing-expert", Behavior::Fail, None);
    let h = harness(spec, &handlers);

    let (_, report) = h
        .dispatcher
        .route_and_dispatch(&Query::new("fix failing async test"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.results[0].attempts, 1);
    assert_eq!(report.results[0].served_by, HandlerId::new("testing-expert"));
    assert!(h.tracker.seen_by("general").is_empty());
}

#[tokio::test]
async fn test_missing_implementation_falls_back() {
    let handlers: Vec<_> = all_succeed().into_iter().filter(|(id, _, _)| *id != "testing-expert").collect();
    let h = harness(RouterConfigManifest::default().spec, &handlers);

    let (_, report) = h
        .dispatcher
        .route_and_dispatch(&Query::new("fix failing async test"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.results[0].served_by, HandlerId::new("general"));
    assert!(report.success);
}

#[tokio::test]
async fn test_partial_failure_in_parallel_plan() {
    let mut spec = RouterConfigManifest::default().spec;
    spec.dispatch.retry_once = false;
    let handlers = replace(all_succeed(), "security-expert", Behavior::Fail, None);
    let h = harness(spec, &handlers);

    let (_, report) = h
        .dispatcher
        .route_and_dispatch(
            &Query::new("container security testing with performance monitoring"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.is_partial());
    let failed: Vec<_> = report.failures().map(|r| r.handler.clone()).collect();
    assert_eq!(failed, vec![HandlerId::new("security-expert")]);
}

#[tokio::test]
async fn test_cancellation_suppresses_outcome() {
    let handlers = replace(all_succeed(), "testing-expert", Behavior::AwaitCancel, None);
    let h = harness(RouterConfigManifest::default().spec, &handlers);
    let mut events = h.bus.subscribe();
    let query = Query::new("fix failing async test");
    let plan = h.engine.route(&query).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = h.dispatcher.dispatch(&query, &plan, &cancel).await.unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));
    assert!(outcome_events(&mut events).is_empty());
    assert!(h.learning.audit_lookup(&query.signature).await.unwrap().is_none());
    assert!(h.tracker.seen_by("general").is_empty());
}

#[tokio::test]
async fn test_cancelled_before_routing() {
    let h = harness(RouterConfigManifest::default().spec, &all_succeed());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .dispatcher
        .route_and_dispatch(&Query::new("fix failing async test"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));
}
