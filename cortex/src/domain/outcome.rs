// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pattern::PlanSummary;
use super::signature::{QuerySignature, SignatureClass};

/// One observed result of dispatching a plan, as fed to the learning store.
///
/// Reports are idempotent per `(signature, plan_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub signature: QuerySignature,
    pub plan_id: Uuid,
    pub class: SignatureClass,
    pub plan: PlanSummary,
    pub success: bool,
    pub latency_ms: u64,
}

impl OutcomeReport {
    pub fn key(&self) -> (QuerySignature, Uuid) {
        (self.signature.clone(), self.plan_id)
    }
}
