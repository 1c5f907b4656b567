// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Routing Engine
//!
//! Facade over the whole decision pipeline:
//!
//! ```text
//! query → registry snapshot → pattern fast path → analyzer → calibrator
//!       → relationship mapper → conflict detector → strategy selector → plan
//! ```
//!
//! Analysis is read-only with respect to shared state. The only writes happen
//! on the feedback path (`report_outcome`), which updates calibration buckets,
//! relationship strengths and, through the learning service, the pattern
//! store.

use anyhow::Result;
use chrono::Utc;
use conductor_cortex::{
    FeedbackError, FeedbackQueue, LearningService, OutcomeReport, Pattern, PlanSummary, QuerySignature,
    SignatureClass,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::analyzer::DomainPatternAnalyzer;
use super::calibration::ConfidenceCalibrator;
use super::conflicts::ConflictDetector;
use super::context_manager::{ContextPreservationManager, HandoffContext};
use super::relationships::{RelationshipAnalysis, RelationshipMapper};
use super::strategy::{DomainCandidate, StrategyDecision, StrategySelector};
use crate::domain::calibration::CalibrationSnapshot;
use crate::domain::confidence::{clamp_unit, ConfidenceThresholds};
use crate::domain::config::{DispatchConfig, RouterConfigSpec};
use crate::domain::context::{ContextBundle, ContextElement, PreservationStrategy};
use crate::domain::errors::RoutingError;
use crate::domain::events::RoutingEvent;
use crate::domain::handler::{DomainId, HandlerDescriptor, HandlerId, HandlerRegistry};
use crate::domain::plan::{
    CoordinationPlan, CoordinationStrategy, DecisionRule, EstimatedCost, HandlerAssignment, PlanAdvisory, PlanId,
};
use crate::domain::query::Query;
use crate::domain::repository::RelationshipRepository;
use crate::domain::score::{AnalysisOutcome, DomainAnalysis, StructuralIntent};
use crate::infrastructure::event_bus::EventBus;

/// What happened to one `report_outcome` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeDisposition {
    Accepted,
    /// Duplicate report for the same (signature, plan) pair
    Coalesced,
    /// Plan id not issued by this engine, or already evicted
    UnknownPlan,
}

/// Everything the feedback path needs to learn from a plan
#[derive(Debug, Clone)]
struct IssuedPlan {
    signature: QuerySignature,
    class: SignatureClass,
    summary: PlanSummary,
    domains: Vec<DomainId>,
    /// (raw score, calibrated prediction) per matched domain
    predictions: Vec<(f64, f64)>,
    reported: bool,
}

/// Bounded FIFO map of issued plans
struct IssuedPlans {
    plans: HashMap<PlanId, IssuedPlan>,
    order: VecDeque<PlanId>,
    capacity: usize,
}

impl IssuedPlans {
    fn new(capacity: usize) -> Self {
        Self {
            plans: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn insert(&mut self, id: PlanId, plan: IssuedPlan) {
        if self.plans.insert(id, plan).is_none() {
            self.order.push_back(id);
        }
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.plans.remove(&evicted);
            }
        }
    }
}

/// Learned patterns found for a query within the lookup budget
#[derive(Default)]
struct LearnedMatch {
    exact: Option<Pattern>,
    similar: Option<(Pattern, f64)>,
}

pub struct RoutingEngine {
    config: RouterConfigSpec,
    analyzer: DomainPatternAnalyzer,
    calibrator: ConfidenceCalibrator,
    relationships: RelationshipMapper,
    conflicts: ConflictDetector,
    selector: StrategySelector,
    context: ContextPreservationManager,
    registry: Arc<dyn HandlerRegistry>,
    learning: Arc<dyn LearningService>,
    feedback: Option<FeedbackQueue>,
    event_bus: EventBus,
    issued: Mutex<IssuedPlans>,
}

impl RoutingEngine {
    pub fn new(
        config: &RouterConfigSpec,
        registry: Arc<dyn HandlerRegistry>,
        learning: Arc<dyn LearningService>,
        relationship_repo: Arc<dyn RelationshipRepository>,
        event_bus: EventBus,
    ) -> Result<Self> {
        let calibrator = ConfidenceCalibrator::new(&config.confidence);
        let medium = calibrator.thresholds().medium;

        Ok(Self {
            analyzer: DomainPatternAnalyzer::new(&config.analyzer)?,
            calibrator,
            relationships: RelationshipMapper::new(
                relationship_repo,
                config.relationships.max_hops,
                config.relationships.learning_rate,
            ),
            conflicts: ConflictDetector::new(&config.conflicts)?,
            selector: StrategySelector::new(&config.strategy, medium, config.conflicts.escalation_severity),
            context: ContextPreservationManager::new(&config.context),
            registry,
            learning,
            feedback: None,
            event_bus,
            issued: Mutex::new(IssuedPlans::new(config.learning.issued_plan_capacity)),
            config: config.clone(),
        })
    }

    /// Route outcome feedback through an asynchronous worker instead of
    /// writing to the learning store inline
    pub fn with_feedback_queue(mut self, queue: FeedbackQueue) -> Self {
        self.feedback = Some(queue);
        self
    }

    pub fn config(&self) -> &RouterConfigSpec {
        &self.config
    }

    pub fn dispatch_config(&self) -> &DispatchConfig {
        &self.config.dispatch
    }

    pub fn thresholds(&self) -> &ConfidenceThresholds {
        self.calibrator.thresholds()
    }

    pub fn registry(&self) -> Arc<dyn HandlerRegistry> {
        self.registry.clone()
    }

    pub fn learning(&self) -> Arc<dyn LearningService> {
        self.learning.clone()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn relationships(&self) -> &RelationshipMapper {
        &self.relationships
    }

    pub fn calibration_snapshot(&self) -> CalibrationSnapshot {
        self.calibrator.snapshot()
    }

    pub async fn route(&self, query: &Query) -> Result<CoordinationPlan, RoutingError> {
        self.route_cancellable(query, &CancellationToken::new()).await
    }

    /// Route, abandoning the decision as soon as `cancellation` fires
    pub async fn route_cancellable(
        &self,
        query: &Query,
        cancellation: &CancellationToken,
    ) -> Result<CoordinationPlan, RoutingError> {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                debug!(signature = query.signature.short(), "Routing cancelled by caller");
                Err(RoutingError::Cancelled)
            }
            result = self.decide(query) => result,
        }
    }

    async fn decide(&self, query: &Query) -> Result<CoordinationPlan, RoutingError> {
        let started = Instant::now();
        let plan_id = PlanId::new();

        let catalog = match self.registry.list_handlers().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Handler registry unavailable, treating snapshot as empty");
                Vec::new()
            }
        };
        if catalog.is_empty() {
            return Err(RoutingError::EmptyRegistry);
        }

        let mut advisories = Vec::new();
        let learned = self.lookup_learned(query, plan_id, &mut advisories).await;

        let analysis = match self.analyzer.analyze(&query.text, &catalog) {
            AnalysisOutcome::Matched(analysis) => analysis,
            AnalysisOutcome::NoMatch { best, .. } => {
                let best_score = best.as_ref().map(|s| s.raw_strength);
                self.event_bus.publish_routing_event(RoutingEvent::NoMatchingDomain {
                    signature: query.signature.clone(),
                    best_score,
                    occurred_at: Utc::now(),
                });
                return self.no_match_plan(query, plan_id, &catalog, best_score.unwrap_or(0.0), advisories, started);
            }
        };

        let candidates = self.candidates(&analysis, &catalog);
        let domains = analysis.domains();

        let relationships = match self.relationships.analyze(&domains).await {
            Ok(relationships) => relationships,
            Err(e) => {
                warn!(error = %e, "Relationship lookup failed, continuing without relationships");
                RelationshipAnalysis::default()
            }
        };
        for pair in &relationships.overflows {
            advisories.push(PlanAdvisory::RelationshipGraphCycleOverflow {
                pair: pair.clone(),
                max_hops: self.relationships.max_hops(),
            });
        }

        let conflicts = self.conflicts.detect(&query.text, &domains, &relationships);
        let escalation = self.conflicts.escalation_severity();
        for conflict in conflicts.iter().filter(|c| c.is_unresolved(escalation)) {
            warn!(pair = %conflict.pair, severity = conflict.severity, "Severe conflict has no known resolution");
            advisories.push(PlanAdvisory::ConflictUnresolved {
                pair: conflict.pair.clone(),
                severity: conflict.severity,
            });
        }

        let coordinator = self
            .config
            .strategy
            .coordinator_handler
            .as_deref()
            .map(HandlerId::new)
            .filter(|id| catalog.iter().any(|d| &d.id == id));

        let mut decision = self
            .selector
            .select(&candidates, analysis.intent, &conflicts, coordinator.as_ref());

        let severe = conflicts.iter().any(|c| c.is_severe(escalation));
        if let Some(pattern) = learned.exact.as_ref().filter(|_| !severe) {
            let sequence: Vec<HandlerId> = pattern.plan.handlers().iter().map(HandlerId::new).collect();
            let learned = self.calibrator.calibrate_sequence(&sequence, pattern.confidence);
            let aggregate = decision.aggregate_confidence.max(learned.probability);
            if let Some(reused) = reuse_pattern(pattern, &catalog, aggregate) {
                info!(
                    signature = query.signature.short(),
                    tier = pattern.tier.as_str(),
                    observations = pattern.observations,
                    "Reusing learned coordination pattern"
                );
                decision = reused;
            }
        } else if let Some((pattern, similarity)) = &learned.similar {
            if pattern.plan.strategy == decision.strategy.as_str() {
                let weight = 0.5 * clamp_unit(*similarity);
                decision.aggregate_confidence =
                    clamp_unit((1.0 - weight) * decision.aggregate_confidence + weight * pattern.confidence);
                debug!(similarity, "Blended confidence with similar learned pattern");
            }
        }

        let assignments = assignments(&decision, &candidates, &catalog);
        let fallbacks = self.fallbacks(&decision, &catalog);
        let plan = self.finish_plan(
            query,
            plan_id,
            decision,
            assignments,
            conflicts,
            advisories,
            fallbacks,
            analysis.intent,
            &catalog,
        );

        self.remember(&plan, query, &analysis, &candidates);
        self.announce(&plan, started);
        Ok(plan)
    }

    /// Exact lookup, then class lookup, both inside the lookup budget
    async fn lookup_learned(&self, query: &Query, plan_id: PlanId, advisories: &mut Vec<PlanAdvisory>) -> LearnedMatch {
        let budget = self.config.learning.lookup_budget;
        let started = Instant::now();

        let exact = match tokio::time::timeout(budget, self.learning.lookup(&query.signature)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                self.degrade(plan_id, advisories, format!("lookup failed: {}", e));
                return LearnedMatch::default();
            }
            Err(_) => {
                self.degrade(plan_id, advisories, format!("lookup exceeded {}ms budget", budget.as_millis()));
                return LearnedMatch::default();
            }
        };
        if exact.is_some() {
            return LearnedMatch { exact, similar: None };
        }

        let remaining = budget.saturating_sub(started.elapsed()).max(Duration::from_millis(1));
        let similar = match tokio::time::timeout(remaining, self.learning.lookup_similar(&query.class)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                self.degrade(plan_id, advisories, format!("similar lookup failed: {}", e));
                None
            }
            Err(_) => {
                debug!("Similar-pattern lookup ran out of budget");
                None
            }
        };
        LearnedMatch { exact: None, similar }
    }

    fn degrade(&self, plan_id: PlanId, advisories: &mut Vec<PlanAdvisory>, reason: String) {
        warn!(reason = %reason, "Pattern store unavailable, routing without learned patterns");
        metrics::counter!("conductor_learning_degraded_total", "operation" => "lookup").increment(1);
        self.event_bus.publish_routing_event(RoutingEvent::DegradedMode {
            plan_id: Some(plan_id),
            component: "pattern_store".to_string(),
            reason: reason.clone(),
            occurred_at: Utc::now(),
        });
        advisories.push(PlanAdvisory::PatternStoreUnavailable { reason });
    }

    fn no_match_plan(
        &self,
        query: &Query,
        plan_id: PlanId,
        catalog: &[HandlerDescriptor],
        best_score: f64,
        mut advisories: Vec<PlanAdvisory>,
        started: Instant,
    ) -> Result<CoordinationPlan, RoutingError> {
        let default = self
            .config
            .registry
            .default_handler
            .as_deref()
            .and_then(|id| catalog.iter().find(|d| d.id.as_str() == id));

        let Some(default) = default else {
            info!(signature = query.signature.short(), best_score, "No domain matched and no default handler");
            return Err(RoutingError::NoMatchingDomain {
                signature: query.signature.clone(),
                best_score,
            });
        };

        info!(
            signature = query.signature.short(),
            handler = %default.id,
            best_score,
            "No domain matched, falling back to default handler"
        );
        advisories.push(PlanAdvisory::NoMatchFallback {
            handler: default.id.clone(),
        });

        let decision = StrategyDecision {
            strategy: CoordinationStrategy::Direct,
            rule: DecisionRule::NoMatchDefault,
            groups: vec![vec![default.id.clone()]],
            aggregate_confidence: clamp_unit(best_score),
        };
        let assignments = vec![HandlerAssignment {
            handler: default.id.clone(),
            domain: default.capability.clone(),
            confidence: decision.aggregate_confidence,
        }];

        let mut plan = self.finish_plan(
            query,
            plan_id,
            decision,
            assignments,
            Vec::new(),
            advisories,
            BTreeMap::new(),
            StructuralIntent::Unspecified,
            catalog,
        );
        // A default-handler plan is always a guess
        plan.requires_confirmation = true;

        self.issued.lock().insert(
            plan.id,
            IssuedPlan {
                signature: query.signature.clone(),
                class: query.class.clone(),
                summary: plan.summary(),
                domains: Vec::new(),
                predictions: Vec::new(),
                reported: false,
            },
        );
        self.announce(&plan, started);
        Ok(plan)
    }

    /// Calibrated candidates in analyzer rank order, each served by the first
    /// registered handler for its domain
    fn candidates(&self, analysis: &DomainAnalysis, catalog: &[HandlerDescriptor]) -> Vec<DomainCandidate> {
        analysis
            .scores
            .iter()
            .filter_map(|score| {
                let descriptor = catalog.iter().find(|d| d.capability == score.domain)?;
                let record = self.calibrator.calibrate(&score.domain, score.raw_strength);
                Some(DomainCandidate {
                    domain: score.domain.clone(),
                    handler: descriptor.id.clone(),
                    confidence: record.probability,
                    expected_latency_ms: descriptor.limits.expected_latency_ms,
                })
            })
            .collect()
    }

    /// Next registered handler of the same domain, else the default handler
    fn fallbacks(&self, decision: &StrategyDecision, catalog: &[HandlerDescriptor]) -> BTreeMap<HandlerId, HandlerId> {
        let default = self
            .config
            .registry
            .default_handler
            .as_deref()
            .map(HandlerId::new)
            .filter(|id| catalog.iter().any(|d| &d.id == id));

        let mut fallbacks = BTreeMap::new();
        for handler in decision.groups.iter().flatten() {
            let sibling = catalog
                .iter()
                .find(|d| &d.id == handler)
                .and_then(|primary| {
                    catalog
                        .iter()
                        .find(|d| d.capability == primary.capability && &d.id != handler)
                })
                .map(|d| d.id.clone());

            if let Some(fallback) = sibling.or_else(|| default.clone().filter(|d| d != handler)) {
                fallbacks.insert(handler.clone(), fallback);
            }
        }
        fallbacks
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_plan(
        &self,
        query: &Query,
        plan_id: PlanId,
        decision: StrategyDecision,
        assignments: Vec<HandlerAssignment>,
        conflicts: Vec<crate::domain::conflict::ConflictRecord>,
        mut advisories: Vec<PlanAdvisory>,
        fallbacks: BTreeMap<HandlerId, HandlerId>,
        intent: StructuralIntent,
        catalog: &[HandlerDescriptor],
    ) -> CoordinationPlan {
        let thresholds = self.calibrator.thresholds();
        let aggregate = clamp_unit(decision.aggregate_confidence);

        let requires_confirmation = thresholds.requires_fallback(aggregate);
        if requires_confirmation {
            advisories.push(PlanAdvisory::LowConfidenceFallback {
                confidence: aggregate,
                floor: thresholds.fallback,
            });
        }

        let latency_of = |id: &HandlerId| {
            catalog
                .iter()
                .find(|d| &d.id == id)
                .map(|d| d.limits.expected_latency_ms)
                .unwrap_or(0)
        };
        let estimated_cost = EstimatedCost {
            handler_invocations: decision.groups.iter().map(Vec::len).sum(),
            critical_path_ms: decision
                .groups
                .iter()
                .map(|group| group.iter().map(&latency_of).max().unwrap_or(0))
                .sum(),
        };

        CoordinationPlan {
            id: plan_id,
            signature: query.signature.clone(),
            strategy: decision.strategy,
            groups: decision.groups,
            assignments,
            aggregate_confidence: aggregate,
            band: thresholds.band(aggregate),
            conflicts,
            estimated_cost,
            rule: decision.rule,
            advisories,
            requires_confirmation,
            fallbacks,
            intent,
            created_at: Utc::now(),
        }
    }

    fn remember(&self, plan: &CoordinationPlan, query: &Query, analysis: &DomainAnalysis, candidates: &[DomainCandidate]) {
        let predictions = analysis
            .scores
            .iter()
            .filter_map(|score| {
                candidates
                    .iter()
                    .find(|c| c.domain == score.domain)
                    .map(|c| (score.raw_strength, c.confidence))
            })
            .collect();

        self.issued.lock().insert(
            plan.id,
            IssuedPlan {
                signature: query.signature.clone(),
                class: query.class.clone(),
                summary: plan.summary(),
                domains: plan.domains(),
                predictions,
                reported: false,
            },
        );
    }

    fn announce(&self, plan: &CoordinationPlan, started: Instant) {
        let latency = started.elapsed();
        metrics::counter!("conductor_routing_decisions_total", "strategy" => plan.strategy.as_str()).increment(1);
        metrics::histogram!("conductor_routing_latency_ms").record(latency.as_secs_f64() * 1000.0);

        info!(
            plan_id = %plan.id,
            signature = plan.signature.short(),
            strategy = %plan.strategy,
            rule = plan.rule.as_str(),
            handlers = plan.handlers().len(),
            confidence = plan.aggregate_confidence,
            band = %plan.band,
            advisories = plan.advisories.len(),
            "Selected coordination plan"
        );

        self.event_bus.publish_routing_event(RoutingEvent::PlanSelected {
            plan_id: plan.id,
            signature: plan.signature.clone(),
            strategy: plan.strategy,
            rule: plan.rule.as_str().to_string(),
            handlers: plan.handlers(),
            aggregate_confidence: plan.aggregate_confidence,
            latency_ms: latency.as_millis() as u64,
            selected_at: Utc::now(),
        });
    }

    /// Idempotent outcome feedback for an issued plan.
    ///
    /// Calibration and relationship updates happen inline; the pattern store
    /// is updated through the feedback queue when one is attached.
    pub async fn report_outcome(
        &self,
        signature: &QuerySignature,
        plan_id: PlanId,
        success: bool,
        latency_ms: u64,
    ) -> Result<OutcomeDisposition, RoutingError> {
        let issued = {
            let mut issued = self.issued.lock();
            let Some(entry) = issued.plans.get_mut(&plan_id) else {
                warn!(plan_id = %plan_id, "Outcome reported for unknown plan");
                return Ok(OutcomeDisposition::UnknownPlan);
            };
            if &entry.signature != signature {
                return Err(RoutingError::InvalidPlan {
                    plan_id,
                    reason: format!("plan was issued for signature {}", entry.signature.short()),
                });
            }
            if entry.reported {
                None
            } else {
                entry.reported = true;
                Some(entry.clone())
            }
        };

        let Some(issued) = issued else {
            debug!(plan_id = %plan_id, "Coalesced duplicate outcome report");
            self.event_bus.publish_routing_event(RoutingEvent::OutcomeCoalesced {
                plan_id,
                signature: signature.clone(),
                reported_at: Utc::now(),
            });
            return Ok(OutcomeDisposition::Coalesced);
        };

        self.event_bus.publish_routing_event(RoutingEvent::OutcomeReported {
            plan_id,
            signature: signature.clone(),
            success,
            latency_ms,
            reported_at: Utc::now(),
        });

        for (raw, predicted) in &issued.predictions {
            if let Some(health) = self.calibrator.record_outcome(*raw, *predicted, success) {
                self.event_bus.publish_routing_event(RoutingEvent::CalibrationHealthChanged {
                    health,
                    mean_absolute_error: self.calibrator.mean_absolute_error(),
                    changed_at: Utc::now(),
                });
            }
        }

        if issued.domains.len() >= 2 {
            match self.relationships.reinforce(&issued.domains, success).await {
                Ok(updated) => {
                    for (edge, delta) in updated {
                        self.event_bus.publish_routing_event(RoutingEvent::RelationshipReinforced {
                            from: edge.from,
                            to: edge.to,
                            delta,
                            strength: edge.strength,
                            updated_at: edge.updated_at,
                        });
                    }
                }
                Err(e) => warn!(error = %e, "Relationship reinforcement failed"),
            }
        }

        let report = OutcomeReport {
            signature: issued.signature,
            plan_id: plan_id.0,
            class: issued.class,
            plan: issued.summary,
            success,
            latency_ms,
        };
        self.submit_feedback(report).await;

        Ok(OutcomeDisposition::Accepted)
    }

    async fn submit_feedback(&self, report: OutcomeReport) {
        let report = match &self.feedback {
            Some(queue) => match queue.submit(report.clone()) {
                Ok(()) => return,
                Err(FeedbackError::QueueFull) => {
                    warn!("Feedback queue full, recording outcome inline");
                    report
                }
                Err(FeedbackError::Closed) => {
                    warn!("Feedback worker stopped, recording outcome inline");
                    report
                }
            },
            None => report,
        };

        if let Err(e) = self.learning.record_outcome(report).await {
            warn!(error = %e, "Failed to record outcome, pattern store degraded");
            metrics::counter!("conductor_learning_degraded_total", "operation" => "record_outcome").increment(1);
            self.event_bus.publish_routing_event(RoutingEvent::DegradedMode {
                plan_id: None,
                component: "pattern_store".to_string(),
                reason: e.to_string(),
                occurred_at: Utc::now(),
            });
        }
    }

    /// Package accumulated context for `target`'s next invocation within `plan`
    pub async fn prepare_handoff(
        &self,
        plan: &CoordinationPlan,
        source: Option<&HandlerId>,
        target: &HandlerId,
        accumulated: &[ContextElement],
        requested: Option<PreservationStrategy>,
    ) -> ContextBundle {
        let target_domain = plan.domain_of(target);
        let source_domain = source.and_then(|s| plan.domain_of(s));

        let relationship_strength = match (source_domain, target_domain) {
            (Some(a), Some(b)) if a != b => self.relationships.direct_strength(a, b).await.unwrap_or_else(|e| {
                debug!(error = %e, "Relationship strength unavailable for handoff");
                0.0
            }),
            _ => 0.0,
        };

        let requested = requested.unwrap_or_else(|| ContextPreservationManager::default_strategy_for(plan));
        let bundle = self.context.prepare(
            requested,
            HandoffContext {
                elements: accumulated,
                target: target_domain,
                relationship_strength,
                domain_count: plan.domains().len(),
            },
        );

        if bundle.quality.degraded {
            self.event_bus.publish_routing_event(RoutingEvent::ContextTransferDegraded {
                target: bundle.target.clone(),
                strategy: bundle.strategy,
                coverage_ratio: bundle.quality.coverage_ratio,
                occurred_at: Utc::now(),
            });
        }
        bundle
    }
}

/// Replay a proven pattern's groups when every handler is still registered
fn reuse_pattern(pattern: &Pattern, catalog: &[HandlerDescriptor], aggregate: f64) -> Option<StrategyDecision> {
    if !pattern.is_proven() {
        return None;
    }
    let strategy: CoordinationStrategy = pattern.plan.strategy.parse().ok()?;
    let groups: Vec<Vec<HandlerId>> = pattern
        .plan
        .groups
        .iter()
        .filter(|group| !group.is_empty())
        .map(|group| group.iter().map(HandlerId::new).collect())
        .collect();
    let registered = groups
        .iter()
        .flatten()
        .all(|h| catalog.iter().any(|d| &d.id == h));
    if groups.is_empty() || !registered {
        return None;
    }

    Some(StrategyDecision {
        strategy,
        rule: DecisionRule::LearnedPattern {
            tier: pattern.tier,
            observations: pattern.observations,
        },
        groups,
        aggregate_confidence: clamp_unit(aggregate),
    })
}

fn assignments(
    decision: &StrategyDecision,
    candidates: &[DomainCandidate],
    catalog: &[HandlerDescriptor],
) -> Vec<HandlerAssignment> {
    decision
        .groups
        .iter()
        .flatten()
        .filter_map(|handler| {
            let descriptor = catalog.iter().find(|d| &d.id == handler)?;
            let confidence = candidates
                .iter()
                .find(|c| &c.handler == handler)
                .map(|c| c.confidence)
                .unwrap_or(decision.aggregate_confidence);
            Some(HandlerAssignment {
                handler: handler.clone(),
                domain: descriptor.capability.clone(),
                confidence,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::RouterConfigManifest;
    use crate::domain::confidence::ConfidenceSubject;
    use crate::infrastructure::handler_registry::StaticHandlerRegistry;
    use crate::infrastructure::relationship_store::InMemoryRelationshipRepository;
    use conductor_cortex::{InMemoryPatternRepository, StandardLearningService};

    fn engine() -> RoutingEngine {
        let spec = RouterConfigManifest::default().spec;
        let bus = EventBus::new(64);
        let registry = Arc::new(StaticHandlerRegistry::from_config(&spec.registry));
        let learning = Arc::new(StandardLearningService::new(
            Arc::new(InMemoryPatternRepository::new()),
            Arc::new(bus.clone()),
        ));
        let relationships = Arc::new(InMemoryRelationshipRepository::seeded(&spec.relationships.seed));
        RoutingEngine::new(&spec, registry, learning, relationships, bus).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_plan_is_reported_not_failed() {
        let engine = engine();
        let query = Query::new("fix failing async test");
        let disposition = engine
            .report_outcome(&query.signature, PlanId::new(), true, 10)
            .await
            .unwrap();
        assert_eq!(disposition, OutcomeDisposition::UnknownPlan);
    }

    #[tokio::test]
    async fn test_signature_mismatch_is_invalid_plan() {
        let engine = engine();
        let plan = engine.route(&Query::new("fix failing async test")).await.unwrap();
        let other = Query::new("optimize database index");
        let err = engine.report_outcome(&other.signature, plan.id, true, 10).await.unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPlan { .. }));
    }

    #[tokio::test]
    async fn test_no_match_routes_to_default_handler() {
        let engine = engine();
        let plan = engine.route(&Query::new("write a haiku about autumn")).await.unwrap();
        assert_eq!(plan.rule, DecisionRule::NoMatchDefault);
        assert_eq!(plan.handlers(), vec![HandlerId::new("general")]);
        assert!(plan.requires_confirmation);
        assert!(plan.has_advisory("no_match_fallback"));
    }

    #[tokio::test]
    async fn test_cancelled_routing_returns_cancelled() {
        let engine = engine();
        let token = CancellationToken::new();
        token.cancel();
        let err = engine
            .route_cancellable(&Query::new("fix failing async test"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Cancelled));
    }

    #[tokio::test]
    async fn test_plan_has_fallbacks_to_default() {
        let engine = engine();
        let plan = engine.route(&Query::new("fix failing async test")).await.unwrap();
        assert_eq!(
            plan.fallbacks.get(&HandlerId::new("testing-expert")),
            Some(&HandlerId::new("general"))
        );
        assert_eq!(plan.estimated_cost.handler_invocations, 1);
        assert_eq!(plan.estimated_cost.critical_path_ms, 500);
    }

    #[tokio::test]
    async fn test_learned_pattern_confidence_is_calibrated_per_sequence() {
        let engine = engine();
        let query = Query::new("fix failing async test");
        for _ in 0..6 {
            let plan = engine.route(&query).await.unwrap();
            engine.report_outcome(&query.signature, plan.id, true, 90).await.unwrap();
        }
        let pattern = engine.learning.lookup(&query.signature).await.unwrap().unwrap();

        let plan = engine.route(&query).await.unwrap();
        assert!(matches!(plan.rule, DecisionRule::LearnedPattern { .. }));
        let sequence = engine.calibrator.calibrate_sequence(&plan.handlers(), pattern.confidence);
        assert_eq!(sequence.subject, ConfidenceSubject::HandlerSequence(plan.handlers()));
        assert!(plan.aggregate_confidence >= sequence.probability - 1e-9);
        assert!(plan.aggregate_confidence <= 1.0);
    }
}
