// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Context carried across handler handoffs

use serde::{Deserialize, Serialize};
use std::fmt;

use super::handler::DomainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Critical,
    High,
    Medium,
    Low,
}

impl Importance {
    pub const TIERS: [Importance; 4] = [
        Importance::Critical,
        Importance::High,
        Importance::Medium,
        Importance::Low,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreservationStrategy {
    Full,
    Selective,
    Hierarchical,
    Adaptive,
}

impl PreservationStrategy {
    /// Strategies whose transfers are checked for degraded coverage
    pub fn is_lossy(&self) -> bool {
        !matches!(self, PreservationStrategy::Full)
    }
}

impl fmt::Display for PreservationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PreservationStrategy::Full => "full",
            PreservationStrategy::Selective => "selective",
            PreservationStrategy::Hierarchical => "hierarchical",
            PreservationStrategy::Adaptive => "adaptive",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextElement {
    pub key: String,
    pub content: String,
    pub importance: Importance,
    /// Domain that produced the element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainId>,
    /// Domains the element is known to matter to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relevant_to: Vec<DomainId>,
    /// Producer bytes removed by compression, across every pass
    #[serde(default)]
    pub elided_bytes: usize,
    /// Length of the producer prefix kept in `content` once an elision marker was appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retained_bytes: Option<usize>,
}

impl ContextElement {
    pub fn new(key: impl Into<String>, content: impl Into<String>, importance: Importance) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
            importance,
            domain: None,
            relevant_to: Vec::new(),
            elided_bytes: 0,
            retained_bytes: None,
        }
    }

    pub fn from_domain(mut self, domain: DomainId) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn relevant_to(mut self, domain: DomainId) -> Self {
        self.relevant_to.push(domain);
        self
    }

    pub fn size(&self) -> usize {
        self.key.len() + self.content.len()
    }

    pub fn is_relevant_to(&self, domain: &DomainId) -> bool {
        self.domain.as_ref() == Some(domain) || self.relevant_to.contains(domain)
    }

    /// Bytes of `content` that came from the producer, excluding any elision marker
    pub fn retained_len(&self) -> usize {
        let retained = self
            .retained_bytes
            .map_or(self.content.len(), |r| r.min(self.content.len()));
        floor_char_boundary(&self.content, retained)
    }

    /// Size of the producer content before any compression
    pub fn original_len(&self) -> usize {
        self.retained_len().saturating_add(self.elided_bytes)
    }

    /// The producer text still present, without the elision marker
    pub fn retained_content(&self) -> &str {
        &self.content[..self.retained_len()]
    }
}

/// Largest char boundary of `s` at or below `index`
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut cut = index.min(s.len());
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Elements kept / elements available
    pub coverage_ratio: f64,
    /// Distinct domains represented in the kept elements
    pub domain_coverage: usize,
    pub domains_available: usize,
    /// Retained content bytes / original content bytes of kept elements
    pub reconstruction_fidelity: f64,
    pub bytes_transferred: usize,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Importance-ranked, most important first
    pub elements: Vec<ContextElement>,
    /// Strategy actually applied (never `Adaptive`)
    pub strategy: PreservationStrategy,
    /// Strategy that was requested
    pub requested: PreservationStrategy,
    pub target: Option<DomainId>,
    pub quality: QualityMetrics,
}

impl ContextBundle {
    pub fn empty(target: Option<DomainId>) -> Self {
        Self {
            elements: Vec::new(),
            strategy: PreservationStrategy::Full,
            requested: PreservationStrategy::Full,
            target,
            quality: QualityMetrics {
                coverage_ratio: 1.0,
                domain_coverage: 0,
                domains_available: 0,
                reconstruction_fidelity: 1.0,
                bytes_transferred: 0,
                degraded: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_orders_critical_first() {
        let mut tiers = vec![Importance::Low, Importance::Critical, Importance::Medium, Importance::High];
        tiers.sort();
        assert_eq!(tiers, Importance::TIERS.to_vec());
    }

    #[test]
    fn test_relevance() {
        let security = DomainId::new("security");
        let element = ContextElement::new("finding", "open port 22", Importance::High)
            .from_domain(DomainId::new("containers"))
            .relevant_to(security.clone());
        assert!(element.is_relevant_to(&security));
        assert!(element.is_relevant_to(&DomainId::new("containers")));
        assert!(!element.is_relevant_to(&DomainId::new("testing")));
    }

    #[test]
    fn test_retained_len_ignores_inconsistent_counters() {
        let mut element = ContextElement::new("note", "ok", Importance::Low);
        element.elided_bytes = 5;
        assert_eq!(element.retained_len(), 2);
        assert_eq!(element.original_len(), 7);

        element.retained_bytes = Some(40);
        assert_eq!(element.retained_len(), 2);

        let mut multibyte = ContextElement::new("note", "héllo", Importance::Low);
        multibyte.retained_bytes = Some(2);
        assert_eq!(multibyte.retained_content(), "h");
    }
}
