// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Errors surfaced by the routing decision API.
//!
//! Conditions that still yield a plan are carried as
//! [`PlanAdvisory`](super::plan::PlanAdvisory) values instead.

use conductor_cortex::{QuerySignature, StoreError};
use thiserror::Error;

use super::plan::PlanId;

#[derive(Debug, Error)]
pub enum RoutingError {
    /// All domain scores fell below the floor and no default handler is configured
    #[error("No domain matched query {signature} (best score {best_score:.2})")]
    NoMatchingDomain {
        signature: QuerySignature,
        best_score: f64,
    },

    #[error("Handler registry snapshot is empty")]
    EmptyRegistry,

    #[error("Pattern store failed its integrity check: {0}")]
    StoreCorrupted(#[source] StoreError),

    #[error("Routing was cancelled")]
    Cancelled,

    #[error("Invalid plan {plan_id}: {reason}")]
    InvalidPlan { plan_id: PlanId, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RoutingError {
    /// Whether the process must stop; everything else degrades one decision
    pub fn is_fatal(&self) -> bool {
        matches!(self, RoutingError::StoreCorrupted(_))
    }
}
