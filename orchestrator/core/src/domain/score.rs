// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain scoring results produced by the pattern analyzer.
//! Computed fresh per query and never persisted.

use serde::{Deserialize, Serialize};

use super::handler::DomainId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainScore {
    pub domain: DomainId,
    /// Match strength in [0,1]
    pub raw_strength: f64,
    pub matched_terms: Vec<String>,
    pub hit_count: usize,
    /// This domain's share of the query's structural complexity
    pub complexity_contribution: f64,
    /// Position of the domain in the registry snapshot, used for tie-breaks
    pub registration_order: usize,
}

/// Coordination shape hinted at by the query's wording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralIntent {
    Unspecified,
    Sequential,
    Parallel,
    Dependency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityEstimate {
    /// Overall complexity in [0,1]
    pub score: f64,
    pub word_count: usize,
    pub distinct_domains: usize,
    pub urgent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAnalysis {
    /// Domains above the floor, strongest first
    pub scores: Vec<DomainScore>,
    pub intent: StructuralIntent,
    pub cues: Vec<String>,
    pub complexity: ComplexityEstimate,
}

impl DomainAnalysis {
    pub fn domains(&self) -> Vec<DomainId> {
        self.scores.iter().map(|s| s.domain.clone()).collect()
    }
}

/// Result of analyzing one query.
///
/// `NoMatch` is an explicit answer, not an error: callers fall back to a
/// default handler instead of guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Matched(DomainAnalysis),
    NoMatch {
        best: Option<DomainScore>,
        complexity: ComplexityEstimate,
    },
}

impl AnalysisOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, AnalysisOutcome::Matched(_))
    }
}
