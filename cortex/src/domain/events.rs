// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the learning store
//! Published on the event bus for observability and integration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pattern::{PatternId, PatternTier};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LearningEvent {
    /// First successful coordination of a novel signature
    PatternDiscovered {
        pattern_id: PatternId,
        signature: String,
        strategy: String,
        timestamp: DateTime<Utc>,
    },

    /// An outcome was folded into an existing pattern
    PatternOutcomeRecorded {
        pattern_id: PatternId,
        success: bool,
        old_success_rate: f64,
        new_success_rate: f64,
        observations: u64,
        timestamp: DateTime<Utc>,
    },

    /// Pattern moved between confidence tiers
    PatternTierChanged {
        pattern_id: PatternId,
        from: PatternTier,
        to: PatternTier,
        timestamp: DateTime<Utc>,
    },

    /// A failed outcome arrived for a signature with no pattern; nothing stored
    OutcomeIgnored {
        signature: String,
        timestamp: DateTime<Utc>,
    },

    /// Duplicate report for an already-applied (signature, plan) pair
    OutcomeCoalesced {
        signature: String,
        plan_id: uuid::Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Store read or write failed; routing continued without learning
    StoreDegraded {
        operation: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Append log rewritten to one entry per signature
    LogCompacted {
        patterns: usize,
        lines_before: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl LearningEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LearningEvent::PatternDiscovered { .. } => "pattern_discovered",
            LearningEvent::PatternOutcomeRecorded { .. } => "pattern_outcome_recorded",
            LearningEvent::PatternTierChanged { .. } => "pattern_tier_changed",
            LearningEvent::OutcomeIgnored { .. } => "outcome_ignored",
            LearningEvent::OutcomeCoalesced { .. } => "outcome_coalesced",
            LearningEvent::StoreDegraded { .. } => "store_degraded",
            LearningEvent::LogCompacted { .. } => "log_compacted",
        }
    }
}
