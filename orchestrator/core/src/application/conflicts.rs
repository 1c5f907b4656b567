// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Conflict Detector
//!
//! Finds incompatible domain pairs within one query. Three sources feed it:
//!
//! 1. The configured conflict rule table, keyed by unordered domain pair
//! 2. `Conflicting` edges in the relationship graph
//! 3. Mutual `Dependent` edges, reported as dependency cycles
//!
//! Contradiction cue phrases in the query ("without sacrificing", "versus")
//! raise the severity of rule and edge conflicts. Detection is symmetric:
//! the order domains arrive in never changes the result.

use anyhow::{Context, Result};
use conductor_cortex::normalize_text;
use regex::Regex;
use std::collections::HashMap;

use super::relationships::RelationshipAnalysis;
use crate::domain::confidence::clamp_unit;
use crate::domain::config::ConflictConfig;
use crate::domain::conflict::{ConflictCategory, ConflictRecord, DomainPair, ResolutionStrategy};
use crate::domain::handler::DomainId;
use crate::domain::relationship::RelationshipKind;

struct RuleEntry {
    category: ConflictCategory,
    severity: f64,
    description: String,
    resolutions: Vec<ResolutionStrategy>,
}

pub struct ConflictDetector {
    rules: HashMap<DomainPair, RuleEntry>,
    cues: Vec<(String, Regex)>,
    cue_increment: f64,
    escalation_severity: f64,
    cycle_severity: f64,
}

impl ConflictDetector {
    pub fn new(config: &ConflictConfig) -> Result<Self> {
        let mut rules = HashMap::new();
        for rule in &config.rules {
            let pair = DomainPair::new(DomainId::new(rule.between[0].clone()), DomainId::new(rule.between[1].clone()));
            // First declaration wins
            rules.entry(pair).or_insert_with(|| RuleEntry {
                category: rule.category,
                severity: clamp_unit(rule.severity),
                description: rule.description.clone(),
                resolutions: rule.resolutions.clone(),
            });
        }

        let cues = config
            .contradiction_cues
            .iter()
            .map(|phrase| {
                let normalized = normalize_text(phrase);
                let regex = Regex::new(&format!(r"\b{}\b", regex::escape(&normalized)))
                    .with_context(|| format!("Invalid contradiction cue '{}'", phrase))?;
                Ok((normalized, regex))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            cues,
            cue_increment: config.cue_increment.max(0.0),
            escalation_severity: config.escalation_severity,
            cycle_severity: clamp_unit(config.cycle_severity),
        })
    }

    pub fn escalation_severity(&self) -> f64 {
        self.escalation_severity
    }

    /// Contradiction cue phrases present in the query
    pub fn contradiction_cues(&self, text: &str) -> Vec<String> {
        let normalized = normalize_text(text);
        self.cues
            .iter()
            .filter(|(_, regex)| regex.is_match(&normalized))
            .map(|(phrase, _)| phrase.clone())
            .collect()
    }

    /// All conflicts among `domains`, sorted by pair
    pub fn detect(&self, text: &str, domains: &[DomainId], relationships: &RelationshipAnalysis) -> Vec<ConflictRecord> {
        let cues = self.contradiction_cues(text);
        let boost = self.cue_increment * cues.len() as f64;
        let mut records = Vec::new();

        for (i, a) in domains.iter().enumerate() {
            for b in domains.iter().skip(i + 1) {
                if a == b {
                    continue;
                }
                let pair = DomainPair::new(a.clone(), b.clone());

                if let Some(rule) = self.rules.get(&pair) {
                    records.push(ConflictRecord {
                        pair: pair.clone(),
                        category: rule.category,
                        severity: clamp_unit(rule.severity + boost),
                        description: rule.description.clone(),
                        resolutions: rule.resolutions.clone(),
                        cues: cues.clone(),
                    });
                } else if let Some(edge) = relationships
                    .edges_of_kind(RelationshipKind::Conflicting)
                    .filter(|e| pair.contains(&e.from) && pair.contains(&e.to))
                    .max_by(|x, y| x.strength.total_cmp(&y.strength))
                {
                    records.push(ConflictRecord {
                        pair: pair.clone(),
                        category: ConflictCategory::ApproachContradiction,
                        severity: clamp_unit(edge.strength + boost),
                        description: format!(
                            "{} and {} have a learned conflicting relationship",
                            pair.first, pair.second
                        ),
                        resolutions: vec![ResolutionStrategy::Negotiate],
                        cues: cues.clone(),
                    });
                }

                if relationships.dependency_cycles.contains(&pair) {
                    records.push(ConflictRecord {
                        pair: pair.clone(),
                        category: ConflictCategory::DependencyCycle,
                        severity: self.cycle_severity,
                        description: format!("{} and {} depend on each other", pair.first, pair.second),
                        resolutions: Vec::new(),
                        cues: Vec::new(),
                    });
                }
            }
        }

        records.sort_by(|x, y| {
            x.pair
                .cmp(&y.pair)
                .then_with(|| x.category.to_string().cmp(&y.category.to_string()))
        });
        records
    }
}
