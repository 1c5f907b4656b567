// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Pattern Analyzer
//!
//! Scores a query against every domain in the registry snapshot using the
//! handlers' weighted trigger vocabularies, detects structural cue phrases and
//! estimates complexity.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Pure, deterministic query → domain scores mapping

use anyhow::{Context, Result};
use conductor_cortex::normalize_text;
use regex::Regex;
use std::cmp::Ordering;

use crate::domain::confidence::clamp_unit;
use crate::domain::config::AnalyzerConfig;
use crate::domain::handler::{DomainId, HandlerDescriptor};
use crate::domain::score::{
    AnalysisOutcome, ComplexityEstimate, DomainAnalysis, DomainScore, StructuralIntent,
};

/// Distinct domains at which the domain-count factor saturates
const DOMAIN_COMPLEXITY_CAP: f64 = 5.0;

struct CuePattern {
    phrase: String,
    regex: Regex,
}

struct DomainVocabulary<'a> {
    domain: DomainId,
    order: usize,
    triggers: Vec<(&'a str, Vec<String>, f64)>,
}

pub struct DomainPatternAnalyzer {
    floor: f64,
    saturation: f64,
    long_query_words: usize,
    sequential: Vec<CuePattern>,
    parallel: Vec<CuePattern>,
    dependency: Vec<CuePattern>,
    urgency: Vec<CuePattern>,
}

impl DomainPatternAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            floor: clamp_unit(config.floor),
            saturation: config.saturation.max(f64::EPSILON),
            long_query_words: config.long_query_words.max(1),
            sequential: compile_cues(&config.sequential_cues)?,
            parallel: compile_cues(&config.parallel_cues)?,
            dependency: compile_cues(&config.dependency_cues)?,
            urgency: compile_cues(&config.urgency_terms)?,
        })
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn analyze(&self, text: &str, catalog: &[HandlerDescriptor]) -> AnalysisOutcome {
        let normalized = normalize_text(text);
        let words: Vec<&str> = normalized.split_whitespace().collect();

        let mut scores: Vec<DomainScore> = vocabularies(catalog)
            .into_iter()
            .map(|vocab| self.score_domain(&words, vocab))
            .filter(|score| score.raw_strength > 0.0)
            .collect();
        scores.sort_by(rank);

        let urgent = self.urgency.iter().any(|cue| cue.regex.is_match(&normalized));
        let matched: Vec<DomainScore> = scores
            .iter()
            .filter(|s| s.raw_strength >= self.floor)
            .cloned()
            .collect();
        let complexity = self.estimate_complexity(words.len(), matched.len(), urgent);

        if matched.is_empty() {
            return AnalysisOutcome::NoMatch {
                best: scores.into_iter().next(),
                complexity,
            };
        }

        let total_strength: f64 = matched.iter().map(|s| s.raw_strength).sum();
        let scores = matched
            .into_iter()
            .map(|mut s| {
                s.complexity_contribution = clamp_unit(complexity.score * s.raw_strength / total_strength);
                s
            })
            .collect();

        let (intent, cues) = self.detect_intent(&normalized);

        AnalysisOutcome::Matched(DomainAnalysis {
            scores,
            intent,
            cues,
            complexity,
        })
    }

    fn score_domain(&self, words: &[&str], vocab: DomainVocabulary<'_>) -> DomainScore {
        let mut weight_sum = 0.0;
        let mut hit_count = 0;
        let mut matched_terms = Vec::new();

        for (term, term_words, weight) in &vocab.triggers {
            let hits = count_phrase_hits(words, term_words);
            if hits > 0 {
                weight_sum += weight;
                hit_count += hits;
                matched_terms.push(term.to_string());
            }
        }

        DomainScore {
            domain: vocab.domain,
            raw_strength: clamp_unit(1.0 - (-weight_sum / self.saturation).exp()),
            matched_terms,
            hit_count,
            complexity_contribution: 0.0,
            registration_order: vocab.order,
        }
    }

    fn estimate_complexity(&self, word_count: usize, distinct_domains: usize, urgent: bool) -> ComplexityEstimate {
        let length_factor = (word_count as f64 / self.long_query_words as f64).min(1.0);
        let domain_factor = (distinct_domains as f64 / DOMAIN_COMPLEXITY_CAP).min(1.0);
        let urgency_factor = if urgent { 1.0 } else { 0.0 };

        ComplexityEstimate {
            score: clamp_unit(0.4 * length_factor + 0.4 * domain_factor + 0.2 * urgency_factor),
            word_count,
            distinct_domains,
            urgent,
        }
    }

    /// Dependency language outranks sequencing, which outranks parallel wording
    fn detect_intent(&self, normalized: &str) -> (StructuralIntent, Vec<String>) {
        let found = |cues: &[CuePattern]| -> Vec<String> {
            cues.iter()
                .filter(|cue| cue.regex.is_match(normalized))
                .map(|cue| cue.phrase.clone())
                .collect()
        };

        let dependency = found(&self.dependency);
        let sequential = found(&self.sequential);
        let parallel = found(&self.parallel);

        let intent = if !dependency.is_empty() {
            StructuralIntent::Dependency
        } else if !sequential.is_empty() {
            StructuralIntent::Sequential
        } else if !parallel.is_empty() {
            StructuralIntent::Parallel
        } else {
            StructuralIntent::Unspecified
        };

        let mut cues = dependency;
        cues.extend(sequential);
        cues.extend(parallel);
        (intent, cues)
    }
}

/// Strongest first; ties by hit count, then registration order
fn rank(a: &DomainScore, b: &DomainScore) -> Ordering {
    b.raw_strength
        .total_cmp(&a.raw_strength)
        .then_with(|| b.hit_count.cmp(&a.hit_count))
        .then_with(|| a.registration_order.cmp(&b.registration_order))
}

/// Group the snapshot's trigger vocabularies by capability, keeping first-seen order
fn vocabularies(catalog: &[HandlerDescriptor]) -> Vec<DomainVocabulary<'_>> {
    let mut vocabularies: Vec<DomainVocabulary<'_>> = Vec::new();

    for descriptor in catalog {
        let index = match vocabularies.iter().position(|v| v.domain == descriptor.capability) {
            Some(index) => index,
            None => {
                vocabularies.push(DomainVocabulary {
                    domain: descriptor.capability.clone(),
                    order: vocabularies.len(),
                    triggers: Vec::new(),
                });
                vocabularies.len() - 1
            }
        };

        let vocab = &mut vocabularies[index];
        for trigger in &descriptor.triggers {
            let term = trigger.term.as_str();
            if vocab.triggers.iter().any(|(existing, _, _)| existing.eq_ignore_ascii_case(term)) {
                continue;
            }
            let term_words: Vec<String> = normalize_text(term)
                .split_whitespace()
                .map(str::to_string)
                .collect();
            if !term_words.is_empty() && trigger.weight > 0.0 {
                vocab.triggers.push((term, term_words, trigger.weight));
            }
        }
    }

    vocabularies
}

/// Count positions where every phrase word prefixes the corresponding query word
fn count_phrase_hits(words: &[&str], phrase: &[String]) -> usize {
    if phrase.is_empty() || phrase.len() > words.len() {
        return 0;
    }
    words
        .windows(phrase.len())
        .filter(|window| window.iter().zip(phrase).all(|(word, term)| word.starts_with(term.as_str())))
        .count()
}

fn compile_cues(phrases: &[String]) -> Result<Vec<CuePattern>> {
    phrases
        .iter()
        .map(|phrase| {
            let normalized = normalize_text(phrase);
            let regex = Regex::new(&format!(r"\b{}\b", regex::escape(&normalized)))
                .with_context(|| format!("Invalid cue phrase '{}'", phrase))?;
            Ok(CuePattern {
                phrase: normalized,
                regex,
            })
        })
        .collect()
}
