// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Pattern Aggregate
//!
//! A [`Pattern`] is a learned association between a query signature and the
//! coordination plan that was dispatched for it, together with the observed
//! outcome statistics.
//!
//! ## Lifecycle
//!
//! | Tier | Entry condition |
//! |------|-----------------|
//! | `Candidate` | fewer than 5 observations, or success rate below the validated bar |
//! | `Validated` | ≥ 5 observations and success rate ≥ 0.6 |
//! | `HighConfidence` | ≥ 25 observations and success rate ≥ 0.8 |
//! | `Deprecated` | the last 10 observations succeed less than 40% of the time |
//!
//! Deprecated patterns are never deleted. They keep recording observations
//! and are reinstated once a full recent window climbs back to the validated
//! success rate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

use super::signature::{QuerySignature, SignatureClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternId(pub Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTier {
    Candidate,
    Validated,
    HighConfidence,
    Deprecated,
}

impl PatternTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternTier::Candidate => "candidate",
            PatternTier::Validated => "validated",
            PatternTier::HighConfidence => "high_confidence",
            PatternTier::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for PatternTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the coordination plan a pattern remembers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub strategy: String,
    /// Handler groups in execution order; members of a group run concurrently
    pub groups: Vec<Vec<String>>,
    pub rule: String,
}

impl PlanSummary {
    /// All handlers in execution order
    pub fn handlers(&self) -> Vec<String> {
        self.groups.iter().flatten().cloned().collect()
    }
}

/// Thresholds driving tier promotion and deprecation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecyclePolicy {
    /// Weight of the newest outcome in the success-rate moving average
    pub ema_alpha: f64,
    pub validated_min_observations: u64,
    pub validated_min_success_rate: f64,
    pub high_confidence_min_observations: u64,
    pub high_confidence_min_success_rate: f64,
    /// Number of most recent outcomes inspected for deprecation
    pub deprecation_window: usize,
    pub deprecation_max_success_rate: f64,
    /// Pseudo-count shrinking confidence for patterns with little evidence
    pub confidence_prior: f64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            ema_alpha: 0.2,
            validated_min_observations: 5,
            validated_min_success_rate: 0.6,
            high_confidence_min_observations: 25,
            high_confidence_min_success_rate: 0.8,
            deprecation_window: 10,
            deprecation_max_success_rate: 0.4,
            confidence_prior: 5.0,
        }
    }
}

/// Tier change produced by recording an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTransition {
    pub from: PatternTier,
    pub to: PatternTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub signature: QuerySignature,
    pub class: SignatureClass,
    pub plan: PlanSummary,
    /// Exponential moving average of outcomes
    pub success_rate: f64,
    pub confidence: f64,
    pub observations: u64,
    pub successes: u64,
    pub recent_outcomes: VecDeque<bool>,
    pub tier: PatternTier,
    pub mean_latency_ms: f64,
    /// Incremented on every recorded outcome
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl Pattern {
    /// Create a pattern from its first (successful) observation
    pub fn new(
        signature: QuerySignature,
        class: SignatureClass,
        plan: PlanSummary,
        latency_ms: u64,
        policy: &LifecyclePolicy,
    ) -> Self {
        let now = Utc::now();
        let mut recent_outcomes = VecDeque::with_capacity(policy.deprecation_window);
        recent_outcomes.push_back(true);

        let mut pattern = Self {
            id: PatternId::new(),
            signature,
            class,
            plan,
            success_rate: 1.0,
            confidence: 0.0,
            observations: 1,
            successes: 1,
            recent_outcomes,
            tier: PatternTier::Candidate,
            mean_latency_ms: latency_ms as f64,
            version: 1,
            created_at: now,
            last_used: now,
        };
        pattern.confidence = pattern.compute_confidence(policy);
        pattern
    }

    /// Fold one outcome into the statistics and re-evaluate the tier
    pub fn record(
        &mut self,
        success: bool,
        latency_ms: u64,
        policy: &LifecyclePolicy,
    ) -> Option<TierTransition> {
        let alpha = policy.ema_alpha.clamp(0.0, 1.0);
        let outcome = if success { 1.0 } else { 0.0 };

        self.observations += 1;
        if success {
            self.successes += 1;
        }
        self.success_rate = (alpha * outcome + (1.0 - alpha) * self.success_rate).clamp(0.0, 1.0);
        self.mean_latency_ms = alpha * latency_ms as f64 + (1.0 - alpha) * self.mean_latency_ms;

        self.recent_outcomes.push_back(success);
        while self.recent_outcomes.len() > policy.deprecation_window.max(1) {
            self.recent_outcomes.pop_front();
        }

        self.confidence = self.compute_confidence(policy);
        self.version += 1;
        self.last_used = Utc::now();

        let previous = self.tier;
        self.tier = self.evaluate_tier(policy);

        (previous != self.tier).then_some(TierTransition {
            from: previous,
            to: self.tier,
        })
    }

    /// Success rate over the recent outcome window
    pub fn recent_success_rate(&self) -> f64 {
        if self.recent_outcomes.is_empty() {
            return 0.0;
        }
        let wins = self.recent_outcomes.iter().filter(|o| **o).count();
        wins as f64 / self.recent_outcomes.len() as f64
    }

    pub fn is_deprecated(&self) -> bool {
        self.tier == PatternTier::Deprecated
    }

    /// Validated and high-confidence patterns may drive a plan directly
    pub fn is_proven(&self) -> bool {
        matches!(self.tier, PatternTier::Validated | PatternTier::HighConfidence)
    }

    fn compute_confidence(&self, policy: &LifecyclePolicy) -> f64 {
        let n = self.observations as f64;
        let prior = policy.confidence_prior.max(0.0);
        (self.success_rate * n / (n + prior)).clamp(0.0, 1.0)
    }

    fn evaluate_tier(&self, policy: &LifecyclePolicy) -> PatternTier {
        let window_full = self.recent_outcomes.len() >= policy.deprecation_window.max(1);
        let recent_rate = self.recent_success_rate();

        if window_full && recent_rate < policy.deprecation_max_success_rate {
            return PatternTier::Deprecated;
        }
        if self.tier == PatternTier::Deprecated
            && !(window_full && recent_rate >= policy.validated_min_success_rate)
        {
            return PatternTier::Deprecated;
        }

        if self.observations >= policy.high_confidence_min_observations
            && self.success_rate >= policy.high_confidence_min_success_rate
        {
            PatternTier::HighConfidence
        } else if self.observations >= policy.validated_min_observations
            && self.success_rate >= policy.validated_min_success_rate
        {
            PatternTier::Validated
        } else {
            PatternTier::Candidate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> PlanSummary {
        PlanSummary {
            strategy: "direct".to_string(),
            groups: vec![vec!["test-runner".to_string()]],
            rule: "single_domain".to_string(),
        }
    }

    fn new_pattern(policy: &LifecyclePolicy) -> Pattern {
        Pattern::new(
            QuerySignature::from_text("fix failing async test"),
            SignatureClass::from_text("fix failing async test"),
            plan(),
            120,
            policy,
        )
    }

    #[test]
    fn test_new_pattern_is_candidate() {
        let policy = LifecyclePolicy::default();
        let pattern = new_pattern(&policy);

        assert_eq!(pattern.tier, PatternTier::Candidate);
        assert_eq!(pattern.observations, 1);
        assert_eq!(pattern.success_rate, 1.0);
        assert!(pattern.confidence > 0.0 && pattern.confidence < 1.0);
    }

    #[test]
    fn test_promotion_to_validated_then_high_confidence() {
        let policy = LifecyclePolicy::default();
        let mut pattern = new_pattern(&policy);

        for _ in 0..4 {
            pattern.record(true, 100, &policy);
        }
        assert_eq!(pattern.observations, 5);
        assert_eq!(pattern.tier, PatternTier::Validated);

        for _ in 0..20 {
            pattern.record(true, 100, &policy);
        }
        assert_eq!(pattern.tier, PatternTier::HighConfidence);
        assert!(pattern.is_proven());
    }

    #[test]
    fn test_sustained_failures_deprecate() {
        let policy = LifecyclePolicy::default();
        let mut pattern = new_pattern(&policy);
        for _ in 0..9 {
            pattern.record(true, 100, &policy);
        }
        assert_eq!(pattern.tier, PatternTier::Validated);

        let mut saw_deprecation = false;
        for _ in 0..30 {
            if let Some(t) = pattern.record(false, 100, &policy) {
                if t.to == PatternTier::Deprecated {
                    saw_deprecation = true;
                }
            }
        }

        assert!(saw_deprecation);
        assert!(pattern.is_deprecated());
        assert_eq!(pattern.observations, 40);
    }

    #[test]
    fn test_deprecated_pattern_recovers_after_full_good_window() {
        let policy = LifecyclePolicy::default();
        let mut pattern = new_pattern(&policy);
        for _ in 0..12 {
            pattern.record(false, 100, &policy);
        }
        assert!(pattern.is_deprecated());

        for _ in 0..5 {
            pattern.record(true, 100, &policy);
        }
        assert!(pattern.is_deprecated(), "half a window is not enough");

        for _ in 0..10 {
            pattern.record(true, 100, &policy);
        }
        assert!(!pattern.is_deprecated());
    }

    #[test]
    fn test_rates_stay_in_unit_interval() {
        let policy = LifecyclePolicy::default();
        let mut pattern = new_pattern(&policy);
        for i in 0..100 {
            pattern.record(i % 3 == 0, 50, &policy);
            assert!((0.0..=1.0).contains(&pattern.success_rate));
            assert!((0.0..=1.0).contains(&pattern.confidence));
        }
        assert_eq!(pattern.recent_outcomes.len(), policy.deprecation_window);
    }
}
