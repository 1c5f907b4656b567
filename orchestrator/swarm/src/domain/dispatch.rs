// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dispatch Results
//!
//! - [`HandlerResult`]: outcome of one plan slot, after any fallback retry.
//! - [`DispatchReport`]: every slot of a plan plus the feedback disposition.
//! - [`DispatchError`]: failures that abort a dispatch as a whole.

use chrono::{DateTime, Utc};
use conductor_core::application::engine::OutcomeDisposition;
use conductor_core::domain::errors::RoutingError;
use conductor_core::domain::handler::{HandlerError, HandlerId, HandlerOutput, HandoffRole};
use conductor_core::domain::plan::{CoordinationStrategy, PlanId};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Succeeded,
    Failed,
    TimedOut,
    /// No invocable implementation was registered for the handler
    Unavailable,
}

impl InvocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::Succeeded => "succeeded",
            InvocationStatus::Failed => "failed",
            InvocationStatus::TimedOut => "timed_out",
            InvocationStatus::Unavailable => "unavailable",
        }
    }

    pub fn from_error(error: &HandlerError) -> Self {
        match error {
            HandlerError::Timeout { .. } => InvocationStatus::TimedOut,
            HandlerError::Unavailable(_) => InvocationStatus::Unavailable,
            HandlerError::Failed { .. } | HandlerError::Cancelled(_) => InvocationStatus::Failed,
        }
    }
}

/// Outcome of one plan slot
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResult {
    /// Handler the plan assigned to this slot
    pub handler: HandlerId,
    /// Handler that produced the final status; differs from `handler` after a fallback retry
    pub served_by: HandlerId,
    pub role: HandoffRole,
    pub status: InvocationStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<HandlerOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl HandlerResult {
    pub fn succeeded(&self) -> bool {
        self.status == InvocationStatus::Succeeded
    }

    pub fn used_fallback(&self) -> bool {
        self.handler != self.served_by
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub plan_id: PlanId,
    pub strategy: CoordinationStrategy,
    /// In plan order: group by group, member by member
    pub results: Vec<HandlerResult>,
    /// Every slot succeeded
    pub success: bool,
    pub latency_ms: u64,
    pub feedback: OutcomeDisposition,
    pub started_at: DateTime<Utc>,
}

impl DispatchReport {
    /// Some slots succeeded and some failed
    pub fn is_partial(&self) -> bool {
        !self.success && self.results.iter().any(HandlerResult::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &HandlerResult> {
        self.results.iter().filter(|r| !r.succeeded())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The caller abandoned the coordination; no outcome was recorded
    #[error("Dispatch cancelled")]
    Cancelled,

    #[error("Plan {0} has no handlers to dispatch")]
    EmptyPlan(PlanId),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}
