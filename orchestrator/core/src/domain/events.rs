// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use conductor_cortex::QuerySignature;
use serde::{Deserialize, Serialize};

use crate::domain::calibration::CalibrationHealth;
use crate::domain::context::PreservationStrategy;
use crate::domain::handler::{DomainId, HandlerId};
use crate::domain::plan::{CoordinationStrategy, PlanId};

/// Routing decision lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingEvent {
    PlanSelected {
        plan_id: PlanId,
        signature: QuerySignature,
        strategy: CoordinationStrategy,
        rule: String,
        handlers: Vec<HandlerId>,
        aggregate_confidence: f64,
        latency_ms: u64,
        selected_at: DateTime<Utc>,
    },
    NoMatchingDomain {
        signature: QuerySignature,
        best_score: Option<f64>,
        occurred_at: DateTime<Utc>,
    },
    DegradedMode {
        plan_id: Option<PlanId>,
        component: String,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    OutcomeReported {
        plan_id: PlanId,
        signature: QuerySignature,
        success: bool,
        latency_ms: u64,
        reported_at: DateTime<Utc>,
    },
    OutcomeCoalesced {
        plan_id: PlanId,
        signature: QuerySignature,
        reported_at: DateTime<Utc>,
    },
    RelationshipReinforced {
        from: DomainId,
        to: DomainId,
        delta: f64,
        strength: f64,
        updated_at: DateTime<Utc>,
    },
    CalibrationHealthChanged {
        health: CalibrationHealth,
        mean_absolute_error: f64,
        changed_at: DateTime<Utc>,
    },
    ContextTransferDegraded {
        target: Option<DomainId>,
        strategy: PreservationStrategy,
        coverage_ratio: f64,
        occurred_at: DateTime<Utc>,
    },
}

impl RoutingEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            RoutingEvent::PlanSelected { .. } => "plan_selected",
            RoutingEvent::NoMatchingDomain { .. } => "no_matching_domain",
            RoutingEvent::DegradedMode { .. } => "degraded_mode",
            RoutingEvent::OutcomeReported { .. } => "outcome_reported",
            RoutingEvent::OutcomeCoalesced { .. } => "outcome_coalesced",
            RoutingEvent::RelationshipReinforced { .. } => "relationship_reinforced",
            RoutingEvent::CalibrationHealthChanged { .. } => "calibration_health_changed",
            RoutingEvent::ContextTransferDegraded { .. } => "context_transfer_degraded",
        }
    }
}
