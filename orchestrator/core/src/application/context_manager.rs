// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Context Preservation Manager
//!
//! Packages the context accumulated so far into a [`ContextBundle`] for the
//! next handler in a plan.
//!
//! - **Full**: everything, uncompressed
//! - **Selective**: critical elements plus those relevant to the target domain
//! - **Hierarchical**: importance tiers in order until the size or time budget runs out
//! - **Adaptive**: picks one of the above from context size, domain count and
//!   source/target relationship strength
//!
//! Lossy strategies truncate oversized elements with an elision marker.

use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, warn};

use crate::domain::config::ContextConfig;
use crate::domain::context::{
    floor_char_boundary, ContextBundle, ContextElement, Importance, PreservationStrategy, QualityMetrics,
};
use crate::domain::handler::DomainId;
use crate::domain::plan::{CoordinationPlan, CoordinationStrategy};

/// Inputs for one handoff
#[derive(Debug, Clone, Copy)]
pub struct HandoffContext<'a> {
    pub elements: &'a [ContextElement],
    pub target: Option<&'a DomainId>,
    /// Relationship strength between the source and target domains
    pub relationship_strength: f64,
    /// Distinct domains involved in the plan
    pub domain_count: usize,
}

pub struct ContextPreservationManager {
    config: ContextConfig,
}

impl ContextPreservationManager {
    pub fn new(config: &ContextConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Strategy used for a plan's handoffs when the caller does not choose one
    pub fn default_strategy_for(plan: &CoordinationPlan) -> PreservationStrategy {
        match plan.strategy {
            CoordinationStrategy::Direct | CoordinationStrategy::PrimarySecondary => PreservationStrategy::Adaptive,
            CoordinationStrategy::Parallel => PreservationStrategy::Selective,
            CoordinationStrategy::Hierarchical => PreservationStrategy::Hierarchical,
        }
    }

    pub fn resolve(&self, requested: PreservationStrategy, handoff: &HandoffContext<'_>) -> PreservationStrategy {
        if requested != PreservationStrategy::Adaptive {
            return requested;
        }
        let total: usize = handoff.elements.iter().map(ContextElement::size).sum();
        if total <= self.config.small_context_bytes {
            PreservationStrategy::Full
        } else if handoff.relationship_strength >= self.config.strong_relationship || handoff.domain_count > 2 {
            PreservationStrategy::Hierarchical
        } else {
            PreservationStrategy::Selective
        }
    }

    pub fn prepare(&self, requested: PreservationStrategy, handoff: HandoffContext<'_>) -> ContextBundle {
        let strategy = self.resolve(requested, &handoff);

        let mut ranked: Vec<&ContextElement> = handoff.elements.iter().collect();
        ranked.sort_by_key(|e| e.importance);

        let kept: Vec<ContextElement> = match strategy {
            PreservationStrategy::Full | PreservationStrategy::Adaptive => ranked.into_iter().cloned().collect(),
            PreservationStrategy::Selective => ranked
                .into_iter()
                .filter(|e| match handoff.target {
                    Some(target) => e.importance == Importance::Critical || e.is_relevant_to(target),
                    None => e.importance <= Importance::High,
                })
                .map(|e| self.compress(e))
                .collect(),
            PreservationStrategy::Hierarchical => self.take_tiers(&ranked),
        };

        let quality = self.measure(handoff.elements, &kept, strategy);
        if quality.degraded {
            warn!(
                target_domain = ?handoff.target.map(DomainId::as_str),
                strategy = %strategy,
                coverage_ratio = quality.coverage_ratio,
                "Degraded context transfer"
            );
        } else {
            debug!(
                strategy = %strategy,
                kept = kept.len(),
                available = handoff.elements.len(),
                bytes = quality.bytes_transferred,
                "Prepared context bundle"
            );
        }

        ContextBundle {
            elements: kept,
            strategy,
            requested,
            target: handoff.target.cloned(),
            quality,
        }
    }

    /// Critical elements always go; later tiers stop at the first element
    /// that would exceed the size budget, or once the time budget is spent.
    fn take_tiers(&self, ranked: &[&ContextElement]) -> Vec<ContextElement> {
        let started = Instant::now();
        let mut kept = Vec::new();
        let mut used = 0usize;

        for element in ranked {
            let compressed = self.compress(element);
            if element.importance != Importance::Critical {
                if used + compressed.size() > self.config.size_budget_bytes {
                    break;
                }
                if started.elapsed() > self.config.time_budget {
                    debug!("Hierarchical context transfer hit its time budget");
                    break;
                }
            }
            used += compressed.size();
            kept.push(compressed);
        }
        kept
    }

    /// Truncates the producer text to the element limit. Re-compressing an
    /// element cuts its retained prefix again and carries the elided total forward.
    fn compress(&self, element: &ContextElement) -> ContextElement {
        let limit = self.config.max_element_bytes;
        if element.content.len() <= limit {
            return element.clone();
        }

        let retained = element.retained_content();
        let cut = floor_char_boundary(retained, limit);
        let elided = element.elided_bytes.saturating_add(retained.len() - cut);

        let mut compressed = element.clone();
        compressed.content = format!("{}...[elided {} bytes]", &retained[..cut], elided);
        compressed.elided_bytes = elided;
        compressed.retained_bytes = Some(cut);
        compressed
    }

    fn measure(&self, available: &[ContextElement], kept: &[ContextElement], strategy: PreservationStrategy) -> QualityMetrics {
        let coverage_ratio = if available.is_empty() {
            1.0
        } else {
            kept.len() as f64 / available.len() as f64
        };

        let domains = |elements: &[ContextElement]| -> usize {
            elements
                .iter()
                .filter_map(|e| e.domain.as_ref())
                .collect::<BTreeSet<_>>()
                .len()
        };

        let retained: usize = kept.iter().map(ContextElement::retained_len).sum();
        let original: usize = kept.iter().map(ContextElement::original_len).sum();
        let reconstruction_fidelity = if original == 0 {
            1.0
        } else {
            (retained as f64 / original as f64).clamp(0.0, 1.0)
        };

        QualityMetrics {
            coverage_ratio,
            domain_coverage: domains(kept),
            domains_available: domains(available),
            reconstruction_fidelity,
            bytes_transferred: kept.iter().map(ContextElement::size).sum(),
            degraded: strategy.is_lossy() && coverage_ratio < self.config.degraded_coverage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(name: &str) -> DomainId {
        DomainId::new(name)
    }

    fn manager() -> ContextPreservationManager {
        ContextPreservationManager::new(&ContextConfig::default())
    }

    fn elements() -> Vec<ContextElement> {
        vec![
            ContextElement::new("notes", "scratch notes", Importance::Low).from_domain(d("testing")),
            ContextElement::new("cve", "CVE-2024-1234 in base image", Importance::Critical).from_domain(d("security")),
            ContextElement::new("limits", "cpu 500m", Importance::Medium)
                .from_domain(d("containers"))
                .relevant_to(d("performance")),
            ContextElement::new("flaky", "test_login flaky", Importance::High).from_domain(d("testing")),
        ]
    }

    fn handoff<'a>(elements: &'a [ContextElement], target: Option<&'a DomainId>) -> HandoffContext<'a> {
        HandoffContext {
            elements,
            target,
            relationship_strength: 0.0,
            domain_count: 2,
        }
    }

    #[test]
    fn test_full_keeps_everything_ranked() {
        let elements = elements();
        let bundle = manager().prepare(PreservationStrategy::Full, handoff(&elements, None));
        assert_eq!(bundle.elements.len(), 4);
        assert_eq!(bundle.elements[0].importance, Importance::Critical);
        assert_eq!(bundle.elements[3].importance, Importance::Low);
        assert_eq!(bundle.quality.coverage_ratio, 1.0);
        assert_eq!(bundle.quality.domain_coverage, 3);
        assert!(!bundle.quality.degraded);
    }

    #[test]
    fn test_selective_keeps_critical_and_relevant() {
        let elements = elements();
        let target = d("performance");
        let bundle = manager().prepare(PreservationStrategy::Selective, handoff(&elements, Some(&target)));

        let keys: Vec<&str> = bundle.elements.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["cve", "limits"]);
        assert_eq!(bundle.quality.coverage_ratio, 0.5);
        assert!(bundle.quality.degraded);
    }

    #[test]
    fn test_hierarchical_stops_at_size_budget() {
        let config = ContextConfig {
            size_budget_bytes: 40,
            ..ContextConfig::default()
        };
        let elements = elements();
        let bundle =
            ContextPreservationManager::new(&config).prepare(PreservationStrategy::Hierarchical, handoff(&elements, None));

        assert_eq!(bundle.elements[0].key, "cve");
        assert!(bundle.elements.len() < 4);
        assert!(bundle.elements.iter().skip(1).all(|e| e.importance != Importance::Critical));
    }

    #[test]
    fn test_adaptive_prefers_full_for_small_context() {
        let elements = elements();
        let bundle = manager().prepare(PreservationStrategy::Adaptive, handoff(&elements, None));
        assert_eq!(bundle.requested, PreservationStrategy::Adaptive);
        assert_eq!(bundle.strategy, PreservationStrategy::Full);
    }

    #[test]
    fn test_adaptive_large_context_follows_relationships() {
        let config = ContextConfig {
            small_context_bytes: 10,
            ..ContextConfig::default()
        };
        let manager = ContextPreservationManager::new(&config);
        let elements = elements();
        let target = d("performance");

        let mut strong = handoff(&elements, Some(&target));
        strong.relationship_strength = 0.8;
        assert_eq!(manager.resolve(PreservationStrategy::Adaptive, &strong), PreservationStrategy::Hierarchical);

        let weak = handoff(&elements, Some(&target));
        assert_eq!(manager.resolve(PreservationStrategy::Adaptive, &weak), PreservationStrategy::Selective);
    }

    #[test]
    fn test_oversized_elements_are_elided() {
        let config = ContextConfig {
            max_element_bytes: 16,
            ..ContextConfig::default()
        };
        let elements = vec![ContextElement::new("trace", "x".repeat(100), Importance::Critical)];
        let bundle = ContextPreservationManager::new(&config).prepare(PreservationStrategy::Selective, handoff(&elements, None));

        let element = &bundle.elements[0];
        assert_eq!(element.elided_bytes, 84);
        assert!(element.content.ends_with("...[elided 84 bytes]"));
        assert!((bundle.quality.reconstruction_fidelity - 0.16).abs() < 1e-9);
    }

    #[test]
    fn test_recompression_keeps_the_elided_total() {
        let config = ContextConfig {
            max_element_bytes: 16,
            ..ContextConfig::default()
        };
        let manager = ContextPreservationManager::new(&config);
        let first = manager.compress(&ContextElement::new("trace", "x".repeat(1000), Importance::Critical));
        assert_eq!(first.elided_bytes, 984);

        let tighter = ContextPreservationManager::new(&ContextConfig {
            max_element_bytes: 8,
            ..ContextConfig::default()
        });
        let second = tighter.compress(&first);
        assert_eq!(second.elided_bytes, 992);
        assert_eq!(second.retained_content(), "x".repeat(8));
        assert_eq!(second.content, format!("{}...[elided 992 bytes]", "x".repeat(8)));
        assert_eq!(second.original_len(), 1000);
    }

    #[test]
    fn test_handler_supplied_elision_counters_stay_bounded() {
        let mut short = ContextElement::new("status", "ok", Importance::Critical);
        short.elided_bytes = 5;
        let elements = vec![short];

        for strategy in [
            PreservationStrategy::Full,
            PreservationStrategy::Selective,
            PreservationStrategy::Hierarchical,
        ] {
            let bundle = manager().prepare(strategy, handoff(&elements, None));
            let fidelity = bundle.quality.reconstruction_fidelity;
            assert!((0.0..=1.0).contains(&fidelity), "{strategy}: {fidelity}");
            assert!((fidelity - 2.0 / 7.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_context_is_full_coverage() {
        let bundle = manager().prepare(PreservationStrategy::Selective, handoff(&[], None));
        assert!(bundle.elements.is_empty());
        assert_eq!(bundle.quality.coverage_ratio, 1.0);
        assert!(!bundle.quality.degraded);
    }
}
