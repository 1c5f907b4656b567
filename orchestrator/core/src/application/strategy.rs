// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordination Strategy Selector
//!
//! Pure decision matrix over (ranked domains, calibrated confidence,
//! conflicts). Rules are evaluated in order and the first match wins:
//!
//! | # | Condition | Strategy |
//! |---|-----------|----------|
//! | 1 | ≤ 1 domain, no conflicts | `Direct` |
//! | 2 | 2 domains, leader ahead by ≥ `dominance_gap`, no severe conflict | `PrimarySecondary` |
//! | 3 | 2..=`max_parallel_domains` domains, aggregate ≥ medium, no severe conflict | `Parallel` |
//! | 4 | anything else | `Hierarchical` |
//!
//! Rule 2 is checked before rule 3, so a two-domain query that satisfies both
//! gets the lower-parallelism plan.

use crate::domain::confidence::clamp_unit;
use crate::domain::config::StrategyConfig;
use crate::domain::conflict::ConflictRecord;
use crate::domain::handler::{DomainId, HandlerId};
use crate::domain::plan::{CoordinationStrategy, DecisionRule, HierarchicalReason};
use crate::domain::score::StructuralIntent;

/// One matched domain with the handler chosen to serve it
#[derive(Debug, Clone, PartialEq)]
pub struct DomainCandidate {
    pub domain: DomainId,
    pub handler: HandlerId,
    pub confidence: f64,
    pub expected_latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDecision {
    pub strategy: CoordinationStrategy,
    pub rule: DecisionRule,
    pub groups: Vec<Vec<HandlerId>>,
    pub aggregate_confidence: f64,
}

pub struct StrategySelector {
    dominance_gap: f64,
    ambiguity_gap: f64,
    max_parallel_domains: usize,
    medium: f64,
    escalation_severity: f64,
}

impl StrategySelector {
    pub fn new(config: &StrategyConfig, medium: f64, escalation_severity: f64) -> Self {
        Self {
            dominance_gap: config.dominance_gap,
            ambiguity_gap: config.ambiguity_gap,
            max_parallel_domains: config.max_parallel_domains.max(2),
            medium,
            escalation_severity,
        }
    }

    /// Mean calibrated confidence over the matched domains
    pub fn aggregate_confidence(candidates: &[DomainCandidate]) -> f64 {
        if candidates.is_empty() {
            return 0.0;
        }
        clamp_unit(candidates.iter().map(|c| c.confidence).sum::<f64>() / candidates.len() as f64)
    }

    /// `candidates` must be ranked strongest first. `coordinator` is the
    /// coordinating handler when one is available in the registry snapshot.
    pub fn select(
        &self,
        candidates: &[DomainCandidate],
        intent: StructuralIntent,
        conflicts: &[ConflictRecord],
        coordinator: Option<&HandlerId>,
    ) -> StrategyDecision {
        let count = candidates.len();
        let aggregate = Self::aggregate_confidence(candidates);
        let gap = leading_gap(candidates);
        let severe = conflicts
            .iter()
            .filter(|c| c.is_severe(self.escalation_severity))
            .max_by(|a, b| a.severity.total_cmp(&b.severity).then_with(|| b.pair.cmp(&a.pair)));
        let handlers = distinct_handlers(candidates);

        if count <= 1 && conflicts.is_empty() {
            return StrategyDecision {
                strategy: CoordinationStrategy::Direct,
                rule: DecisionRule::SingleDomain,
                groups: CoordinationStrategy::Direct.group(&handlers),
                aggregate_confidence: aggregate,
            };
        }

        if count == 2 && severe.is_none() && gap >= self.dominance_gap {
            return StrategyDecision {
                strategy: CoordinationStrategy::PrimarySecondary,
                rule: DecisionRule::DominantWithSecondary { gap },
                groups: CoordinationStrategy::PrimarySecondary.group(&handlers),
                aggregate_confidence: aggregate,
            };
        }

        if (2..=self.max_parallel_domains).contains(&count) && severe.is_none() && aggregate >= self.medium {
            return StrategyDecision {
                strategy: CoordinationStrategy::Parallel,
                rule: DecisionRule::ParallelFanOut,
                groups: CoordinationStrategy::Parallel.group(&handlers),
                aggregate_confidence: aggregate,
            };
        }

        let reason = if count > self.max_parallel_domains {
            HierarchicalReason::TooManyDomains { count }
        } else if let Some(conflict) = severe {
            HierarchicalReason::SevereConflict {
                pair: conflict.pair.clone(),
                severity: conflict.severity,
            }
        } else {
            HierarchicalReason::LowConfidence {
                aggregate,
                ambiguous: count >= 2 && gap < self.ambiguity_gap,
            }
        };

        StrategyDecision {
            strategy: CoordinationStrategy::Hierarchical,
            rule: DecisionRule::Hierarchical(reason),
            groups: hierarchical_groups(&handlers, intent, coordinator),
            aggregate_confidence: aggregate,
        }
    }
}

fn leading_gap(candidates: &[DomainCandidate]) -> f64 {
    match candidates {
        [first, second, ..] => first.confidence - second.confidence,
        _ => 0.0,
    }
}

fn distinct_handlers(candidates: &[DomainCandidate]) -> Vec<HandlerId> {
    let mut handlers: Vec<HandlerId> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !handlers.contains(&candidate.handler) {
            handlers.push(candidate.handler.clone());
        }
    }
    handlers
}

/// Coordinator first, then the specialists. Ordered intents get one group per
/// specialist so the coordinator's sequencing is preserved.
fn hierarchical_groups(
    handlers: &[HandlerId],
    intent: StructuralIntent,
    coordinator: Option<&HandlerId>,
) -> Vec<Vec<HandlerId>> {
    let (lead, specialists): (HandlerId, Vec<HandlerId>) = match coordinator {
        Some(coordinator) => (
            coordinator.clone(),
            handlers.iter().filter(|h| *h != coordinator).cloned().collect(),
        ),
        // No coordinating handler available; the strongest specialist leads
        None => match handlers.split_first() {
            Some((first, rest)) => (first.clone(), rest.to_vec()),
            None => return Vec::new(),
        },
    };

    let mut groups = vec![vec![lead]];
    if specialists.is_empty() {
        return groups;
    }
    match intent {
        StructuralIntent::Sequential | StructuralIntent::Dependency => {
            groups.extend(specialists.into_iter().map(|h| vec![h]));
        }
        StructuralIntent::Parallel | StructuralIntent::Unspecified => groups.push(specialists),
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conflict::{ConflictCategory, DomainPair, ResolutionStrategy};

    fn selector() -> StrategySelector {
        StrategySelector::new(&StrategyConfig::default(), 0.5, 0.8)
    }

    fn candidate(domain: &str, confidence: f64) -> DomainCandidate {
        DomainCandidate {
            domain: DomainId::new(domain),
            handler: HandlerId::new(format!("{}-expert", domain)),
            confidence,
            expected_latency_ms: 500,
        }
    }

    fn conflict(a: &str, b: &str, severity: f64) -> ConflictRecord {
        ConflictRecord {
            pair: DomainPair::new(DomainId::new(a), DomainId::new(b)),
            category: ConflictCategory::ApproachContradiction,
            severity,
            description: "latency vs protection".to_string(),
            resolutions: vec![ResolutionStrategy::Negotiate],
            cues: vec![],
        }
    }

    #[test]
    fn test_single_domain_is_direct() {
        let decision = selector().select(&[candidate("testing", 0.78)], StructuralIntent::Unspecified, &[], None);
        assert_eq!(decision.strategy, CoordinationStrategy::Direct);
        assert_eq!(decision.rule, DecisionRule::SingleDomain);
        assert_eq!(decision.groups, vec![vec![HandlerId::new("testing-expert")]]);
        assert!((decision.aggregate_confidence - 0.78).abs() < 1e-9);
    }

    #[test]
    fn test_dominant_pair_is_primary_secondary() {
        let decision = selector().select(
            &[candidate("debugging", 0.85), candidate("testing", 0.4)],
            StructuralIntent::Unspecified,
            &[],
            None,
        );
        assert_eq!(decision.strategy, CoordinationStrategy::PrimarySecondary);
        assert_eq!(decision.groups.len(), 2);
        assert_eq!(decision.groups[0], vec![HandlerId::new("debugging-expert")]);
    }

    #[test]
    fn test_four_balanced_domains_fan_out() {
        let candidates = [
            candidate("performance", 0.82),
            candidate("security", 0.63),
            candidate("containers", 0.63),
            candidate("testing", 0.63),
        ];
        let decision = selector().select(
            &candidates,
            StructuralIntent::Parallel,
            &[conflict("security", "performance", 0.6)],
            None,
        );
        assert_eq!(decision.strategy, CoordinationStrategy::Parallel);
        assert_eq!(decision.rule, DecisionRule::ParallelFanOut);
        assert_eq!(decision.groups.len(), 1);
        assert_eq!(decision.groups[0].len(), 4);
        assert!(decision.aggregate_confidence >= 0.5);
    }

    #[test]
    fn test_five_domains_with_severe_conflict_is_hierarchical() {
        let candidates = [
            candidate("security", 0.95),
            candidate("performance", 0.9),
            candidate("containers", 0.9),
            candidate("testing", 0.85),
            candidate("debugging", 0.85),
        ];
        let coordinator = HandlerId::new("coordinator");
        let decision = selector().select(
            &candidates,
            StructuralIntent::Unspecified,
            &[conflict("security", "performance", 0.85)],
            Some(&coordinator),
        );
        assert_eq!(decision.strategy, CoordinationStrategy::Hierarchical);
        assert_eq!(decision.groups[0], vec![coordinator]);
        assert_eq!(decision.groups[1].len(), 5);
    }

    #[test]
    fn test_severe_conflict_escalates_despite_high_confidence() {
        let decision = selector().select(
            &[candidate("security", 0.95), candidate("performance", 0.9)],
            StructuralIntent::Unspecified,
            &[conflict("security", "performance", 0.85)],
            None,
        );
        assert_eq!(decision.strategy, CoordinationStrategy::Hierarchical);
        match decision.rule {
            DecisionRule::Hierarchical(HierarchicalReason::SevereConflict { severity, .. }) => {
                assert!((severity - 0.85).abs() < 1e-9)
            }
            other => panic!("unexpected rule {:?}", other),
        }
        // No coordinator: the strongest specialist leads
        assert_eq!(decision.groups[0], vec![HandlerId::new("security-expert")]);
    }

    #[test]
    fn test_ambiguous_low_confidence_is_hierarchical() {
        let decision = selector().select(
            &[candidate("architecture", 0.35), candidate("database", 0.3), candidate("debugging", 0.3)],
            StructuralIntent::Sequential,
            &[],
            Some(&HandlerId::new("coordinator")),
        );
        assert_eq!(
            decision.rule,
            DecisionRule::Hierarchical(HierarchicalReason::LowConfidence {
                aggregate: decision.aggregate_confidence,
                ambiguous: true,
            })
        );
        // Sequential intent keeps one specialist per group
        assert_eq!(decision.groups.len(), 4);
    }

    #[test]
    fn test_selection_is_idempotent() {
        let candidates = [candidate("security", 0.7), candidate("containers", 0.65)];
        let conflicts = [conflict("security", "containers", 0.3)];
        let first = selector().select(&candidates, StructuralIntent::Parallel, &conflicts, None);
        for _ in 0..10 {
            assert_eq!(selector().select(&candidates, StructuralIntent::Parallel, &conflicts, None), first);
        }
    }
}
