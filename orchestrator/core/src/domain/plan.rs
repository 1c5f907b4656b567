// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Coordination Plan - the authoritative output of one routing decision
//!
//! A plan is immutable once produced. It records which decision rule fired so
//! that every routing decision can be audited after the fact.

use chrono::{DateTime, Utc};
use conductor_cortex::{PatternTier, PlanSummary, QuerySignature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::confidence::ConfidenceBand;
use super::conflict::{ConflictRecord, DomainPair};
use super::handler::{DomainId, HandlerId};
use super::score::StructuralIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub Uuid);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStrategy {
    Direct,
    PrimarySecondary,
    Parallel,
    Hierarchical,
}

impl CoordinationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinationStrategy::Direct => "direct",
            CoordinationStrategy::PrimarySecondary => "primary_secondary",
            CoordinationStrategy::Parallel => "parallel",
            CoordinationStrategy::Hierarchical => "hierarchical",
        }
    }

    /// Default handler groups for a flat, ordered handler list
    pub fn group(&self, handlers: &[HandlerId]) -> Vec<Vec<HandlerId>> {
        match self {
            CoordinationStrategy::Direct => handlers.first().map(|h| vec![vec![h.clone()]]).unwrap_or_default(),
            CoordinationStrategy::PrimarySecondary => handlers.iter().take(2).map(|h| vec![h.clone()]).collect(),
            CoordinationStrategy::Parallel => {
                if handlers.is_empty() {
                    Vec::new()
                } else {
                    vec![handlers.to_vec()]
                }
            }
            CoordinationStrategy::Hierarchical => match handlers.split_first() {
                Some((coordinator, rest)) if !rest.is_empty() => {
                    vec![vec![coordinator.clone()], rest.to_vec()]
                }
                Some((coordinator, _)) => vec![vec![coordinator.clone()]],
                None => Vec::new(),
            },
        }
    }
}

impl fmt::Display for CoordinationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoordinationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(CoordinationStrategy::Direct),
            "primary_secondary" => Ok(CoordinationStrategy::PrimarySecondary),
            "parallel" => Ok(CoordinationStrategy::Parallel),
            "hierarchical" => Ok(CoordinationStrategy::Hierarchical),
            other => Err(format!("unknown coordination strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HierarchicalReason {
    TooManyDomains { count: usize },
    SevereConflict { pair: DomainPair, severity: f64 },
    LowConfidence { aggregate: f64, ambiguous: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DecisionRule {
    /// Zero or one domain above the floor, no conflicts
    SingleDomain,
    /// One dominant domain plus a single secondary
    DominantWithSecondary { gap: f64 },
    /// Two to four domains with adequate confidence
    ParallelFanOut,
    Hierarchical(HierarchicalReason),
    /// Reused a proven plan from the learning store
    LearnedPattern { tier: PatternTier, observations: u64 },
    /// Nothing matched; routed to the default handler
    NoMatchDefault,
}

impl DecisionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionRule::SingleDomain => "single_domain",
            DecisionRule::DominantWithSecondary { .. } => "dominant_with_secondary",
            DecisionRule::ParallelFanOut => "parallel_fan_out",
            DecisionRule::Hierarchical(_) => "hierarchical_escalation",
            DecisionRule::LearnedPattern { .. } => "learned_pattern",
            DecisionRule::NoMatchDefault => "no_match_default",
        }
    }
}

/// Non-fatal conditions attached to a plan instead of failing the decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "advisory", rename_all = "snake_case")]
pub enum PlanAdvisory {
    LowConfidenceFallback { confidence: f64, floor: f64 },
    ConflictUnresolved { pair: DomainPair, severity: f64 },
    PatternStoreUnavailable { reason: String },
    RelationshipGraphCycleOverflow { pair: DomainPair, max_hops: usize },
    NoMatchFallback { handler: HandlerId },
}

impl PlanAdvisory {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanAdvisory::LowConfidenceFallback { .. } => "low_confidence_fallback",
            PlanAdvisory::ConflictUnresolved { .. } => "conflict_unresolved",
            PlanAdvisory::PatternStoreUnavailable { .. } => "pattern_store_unavailable",
            PlanAdvisory::RelationshipGraphCycleOverflow { .. } => "relationship_graph_cycle_overflow",
            PlanAdvisory::NoMatchFallback { .. } => "no_match_fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerAssignment {
    pub handler: HandlerId,
    pub domain: DomainId,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatedCost {
    pub handler_invocations: usize,
    /// Sum over groups of the slowest member's expected latency
    pub critical_path_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationPlan {
    pub id: PlanId,
    pub signature: QuerySignature,
    pub strategy: CoordinationStrategy,
    /// Execution groups in order; members of one group run concurrently
    pub groups: Vec<Vec<HandlerId>>,
    pub assignments: Vec<HandlerAssignment>,
    pub aggregate_confidence: f64,
    pub band: ConfidenceBand,
    pub conflicts: Vec<ConflictRecord>,
    pub estimated_cost: EstimatedCost,
    pub rule: DecisionRule,
    pub advisories: Vec<PlanAdvisory>,
    pub requires_confirmation: bool,
    /// Next-best handler to retry with when a handler fails
    #[serde(default)]
    pub fallbacks: BTreeMap<HandlerId, HandlerId>,
    pub intent: StructuralIntent,
    pub created_at: DateTime<Utc>,
}

impl CoordinationPlan {
    /// All handlers in execution order
    pub fn handlers(&self) -> Vec<HandlerId> {
        self.groups.iter().flatten().cloned().collect()
    }

    pub fn domains(&self) -> Vec<DomainId> {
        let mut domains: Vec<DomainId> = Vec::new();
        for assignment in &self.assignments {
            if !domains.contains(&assignment.domain) {
                domains.push(assignment.domain.clone());
            }
        }
        domains
    }

    pub fn domain_of(&self, handler: &HandlerId) -> Option<&DomainId> {
        self.assignments
            .iter()
            .find(|a| &a.handler == handler)
            .map(|a| &a.domain)
    }

    pub fn has_advisory(&self, kind: &str) -> bool {
        self.advisories.iter().any(|a| a.kind() == kind)
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            strategy: self.strategy.as_str().to_string(),
            groups: self
                .groups
                .iter()
                .map(|group| group.iter().map(|h| h.0.clone()).collect())
                .collect(),
            rule: self.rule.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<HandlerId> {
        names.iter().map(|n| HandlerId::new(*n)).collect()
    }

    #[test]
    fn test_strategy_round_trips_through_str() {
        for strategy in [
            CoordinationStrategy::Direct,
            CoordinationStrategy::PrimarySecondary,
            CoordinationStrategy::Parallel,
            CoordinationStrategy::Hierarchical,
        ] {
            assert_eq!(strategy.as_str().parse::<CoordinationStrategy>().unwrap(), strategy);
        }
        assert!("fan_out".parse::<CoordinationStrategy>().is_err());
    }

    #[test]
    fn test_grouping_by_strategy() {
        let handlers = ids(&["coord", "sec", "perf"]);
        assert_eq!(CoordinationStrategy::Direct.group(&handlers), vec![ids(&["coord"])]);
        assert_eq!(
            CoordinationStrategy::PrimarySecondary.group(&handlers),
            vec![ids(&["coord"]), ids(&["sec"])]
        );
        assert_eq!(CoordinationStrategy::Parallel.group(&handlers), vec![handlers.clone()]);
        assert_eq!(
            CoordinationStrategy::Hierarchical.group(&handlers),
            vec![ids(&["coord"]), ids(&["sec", "perf"])]
        );
        assert!(CoordinationStrategy::Parallel.group(&[]).is_empty());
    }
}
