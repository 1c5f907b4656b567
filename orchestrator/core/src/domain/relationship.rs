// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cross-domain relationship graph entities
//!
//! Edges are reinforced on successful co-dispatch and weakened on failure,
//! with every change bounded by the learning rate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::confidence::clamp_unit;
use super::handler::DomainId;

/// Hard ceiling on the per-observation strength change
pub const MAX_LEARNING_RATE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Sequential,
    Parallel,
    Hierarchical,
    Synergistic,
    Conflicting,
    Dependent,
    /// No known relationship; strength is always 0
    Independent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRelationship {
    pub from: DomainId,
    pub to: DomainId,
    pub kind: RelationshipKind,
    pub strength: f64,
    pub bidirectional: bool,
    #[serde(default)]
    pub observations: u64,
    pub updated_at: DateTime<Utc>,
}

impl DomainRelationship {
    pub fn new(
        from: DomainId,
        to: DomainId,
        kind: RelationshipKind,
        strength: f64,
        bidirectional: bool,
    ) -> Self {
        Self {
            from,
            to,
            kind,
            strength: clamp_unit(strength),
            bidirectional,
            observations: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn independent(from: DomainId, to: DomainId) -> Self {
        Self::new(from, to, RelationshipKind::Independent, 0.0, true)
    }

    /// Whether this edge connects `a` and `b` in that direction
    pub fn connects(&self, a: &DomainId, b: &DomainId) -> bool {
        (&self.from == a && &self.to == b) || (self.bidirectional && &self.from == b && &self.to == a)
    }

    /// Move strength toward 1 on success and toward 0 on failure.
    ///
    /// Returns the applied delta, whose magnitude never exceeds
    /// `min(learning_rate, MAX_LEARNING_RATE)`.
    pub fn apply_outcome(&mut self, success: bool, learning_rate: f64) -> f64 {
        let rate = learning_rate.clamp(0.0, MAX_LEARNING_RATE);
        let target = if success { 1.0 } else { 0.0 };
        let before = self.strength;
        self.strength = clamp_unit(before + rate * (target - before));
        self.observations += 1;
        self.updated_at = Utc::now();
        self.strength - before
    }
}

/// Transitive relationship found by bounded path search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipPath {
    pub from: DomainId,
    pub to: DomainId,
    pub hops: Vec<DomainId>,
    /// Product of edge strengths along the path
    pub strength: f64,
}
