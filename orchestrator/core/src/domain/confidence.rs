// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Confidence records and threshold bands

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::handler::{DomainId, HandlerId};

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfidenceBand::Low => "low",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::High => "high",
        };
        f.write_str(label)
    }
}

/// Band boundaries. `fallback` is the floor below which a plan needs confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
    pub fallback: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.7,
            medium: 0.5,
            fallback: 0.4,
        }
    }
}

impl ConfidenceThresholds {
    pub fn band(&self, probability: f64) -> ConfidenceBand {
        if probability >= self.high {
            ConfidenceBand::High
        } else if probability >= self.medium {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn requires_fallback(&self, probability: f64) -> bool {
        probability < self.fallback
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ConfidenceSubject {
    Domain(DomainId),
    HandlerSequence(Vec<HandlerId>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRecord {
    pub subject: ConfidenceSubject,
    /// Calibrated probability of a correct routing decision
    pub probability: f64,
    pub raw_score: f64,
    /// Observations backing the calibration bucket
    pub sample_count: u64,
    pub bucket: usize,
    pub band: ConfidenceBand,
    pub updated_at: DateTime<Utc>,
}
