// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Conflict records between domains detected within one query

use serde::{Deserialize, Serialize};
use std::fmt;

use super::handler::DomainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCategory {
    ResourceCompetition,
    ApproachContradiction,
    Timing,
    DependencyCycle,
}

impl fmt::Display for ConflictCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConflictCategory::ResourceCompetition => "resource_competition",
            ConflictCategory::ApproachContradiction => "approach_contradiction",
            ConflictCategory::Timing => "timing",
            ConflictCategory::DependencyCycle => "dependency_cycle",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Run the two domains one after the other
    Sequence,
    /// Let a coordinating handler arbitrate
    Negotiate,
    /// Give the higher-scoring domain the final say
    PrioritizePrimary,
    /// Split shared resources between the two handlers
    PartitionResources,
}

/// Unordered domain pair, stored sorted so {A,B} and {B,A} compare equal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainPair {
    pub first: DomainId,
    pub second: DomainId,
}

impl DomainPair {
    pub fn new(a: DomainId, b: DomainId) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn contains(&self, domain: &DomainId) -> bool {
        &self.first == domain || &self.second == domain
    }
}

impl fmt::Display for DomainPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.first, self.second)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub pair: DomainPair,
    pub category: ConflictCategory,
    pub severity: f64,
    pub description: String,
    /// Ordered by preference; empty when nothing viable is known
    pub resolutions: Vec<ResolutionStrategy>,
    /// Query phrases that raised the severity
    #[serde(default)]
    pub cues: Vec<String>,
}

impl ConflictRecord {
    pub fn is_severe(&self, escalation_severity: f64) -> bool {
        self.severity >= escalation_severity
    }

    pub fn is_unresolved(&self, escalation_severity: f64) -> bool {
        self.is_severe(escalation_severity) && self.resolutions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_canonical() {
        let a = DomainPair::new(DomainId::new("security"), DomainId::new("performance"));
        let b = DomainPair::new(DomainId::new("performance"), DomainId::new("security"));
        assert_eq!(a, b);
        assert_eq!(a.first.as_str(), "performance");
        assert!(a.contains(&DomainId::new("security")));
    }

    #[test]
    fn test_unresolved_requires_severity_and_no_resolution() {
        let mut record = ConflictRecord {
            pair: DomainPair::new(DomainId::new("a"), DomainId::new("b")),
            category: ConflictCategory::DependencyCycle,
            severity: 0.9,
            description: "cycle".to_string(),
            resolutions: vec![],
            cues: vec![],
        };
        assert!(record.is_unresolved(0.8));

        record.resolutions.push(ResolutionStrategy::Negotiate);
        assert!(!record.is_unresolved(0.8));

        record.resolutions.clear();
        record.severity = 0.5;
        assert!(!record.is_unresolved(0.8));
    }
}
