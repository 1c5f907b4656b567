// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Plan Dispatcher
//!
//! Runs a coordination plan's handler groups in order, invoking the members
//! of each group concurrently under a global concurrency ceiling. Context
//! produced by earlier groups is packaged through the routing engine's
//! context manager for every later handoff.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Execute plans and feed their outcome back to the engine

use chrono::Utc;
use conductor_core::application::engine::RoutingEngine;
use conductor_core::domain::config::DispatchConfig;
use conductor_core::domain::context::{ContextBundle, ContextElement};
use conductor_core::domain::errors::RoutingError;
use conductor_core::domain::handler::{HandlerError, HandlerId, HandlerOutput, HandoffRequest, HandoffRole};
use conductor_core::domain::plan::{CoordinationPlan, CoordinationStrategy};
use conductor_core::domain::query::Query;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{DispatchError, DispatchReport, HandlerResult, InvocationStatus};

pub struct PlanDispatcher {
    engine: Arc<RoutingEngine>,
    config: DispatchConfig,
    permits: Arc<Semaphore>,
    handler_permits: DashMap<HandlerId, Arc<Semaphore>>,
}

impl PlanDispatcher {
    pub fn new(engine: Arc<RoutingEngine>) -> Self {
        let config = engine.dispatch_config().clone();
        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrent_handlers.max(1))),
            handler_permits: DashMap::new(),
            config,
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<RoutingEngine> {
        &self.engine
    }

    /// Invocation slots currently free under the global ceiling
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Route `query` and dispatch the resulting plan
    pub async fn route_and_dispatch(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<(CoordinationPlan, DispatchReport), DispatchError> {
        let plan = match self.engine.route_cancellable(query, cancel).await {
            Err(RoutingError::Cancelled) => return Err(DispatchError::Cancelled),
            other => other?,
        };
        let report = self.dispatch(query, &plan, cancel).await?;
        Ok((plan, report))
    }

    /// Execute `plan` and report its outcome.
    ///
    /// Cancelling `cancel` aborts every in-flight invocation and returns
    /// [`DispatchError::Cancelled`] without recording an outcome.
    pub async fn dispatch(
        &self,
        query: &Query,
        plan: &CoordinationPlan,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, DispatchError> {
        if plan.groups.iter().all(Vec::is_empty) {
            return Err(DispatchError::EmptyPlan(plan.id));
        }

        let token = cancel.child_token();
        let started = Instant::now();
        let started_at = Utc::now();
        info!(
            plan_id = %plan.id,
            strategy = %plan.strategy,
            groups = plan.groups.len(),
            "Dispatching plan"
        );

        let results = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            results = self.run_groups(query, plan, &token) => Some(results),
        };
        let results = match results {
            Some(results) if !token.is_cancelled() => results,
            _ => {
                token.cancel();
                warn!(plan_id = %plan.id, "Dispatch cancelled, outcome not recorded");
                metrics::counter!("conductor_dispatch_cancelled_total").increment(1);
                return Err(DispatchError::Cancelled);
            }
        };

        let success = !results.is_empty() && results.iter().all(HandlerResult::succeeded);
        let latency_ms = started.elapsed().as_millis() as u64;
        let feedback = self
            .engine
            .report_outcome(&plan.signature, plan.id, success, latency_ms)
            .await?;

        metrics::histogram!("conductor_dispatch_latency_ms").record(latency_ms as f64);
        let failed = results.iter().filter(|r| !r.succeeded()).count();
        if failed > 0 {
            warn!(
                plan_id = %plan.id,
                failed,
                total = results.len(),
                latency_ms,
                "Plan dispatched with failed handlers"
            );
        } else {
            info!(plan_id = %plan.id, handlers = results.len(), latency_ms, "Plan dispatched");
        }

        Ok(DispatchReport {
            plan_id: plan.id,
            strategy: plan.strategy,
            results,
            success,
            latency_ms,
            feedback,
            started_at,
        })
    }

    async fn run_groups(
        &self,
        query: &Query,
        plan: &CoordinationPlan,
        token: &CancellationToken,
    ) -> Vec<HandlerResult> {
        let mut accumulated: Vec<ContextElement> = Vec::new();
        let mut source: Option<HandlerId> = None;
        let mut results = Vec::with_capacity(plan.handlers().len());

        for (index, group) in plan.groups.iter().enumerate() {
            let role = role_for(plan.strategy, index);
            let shared = &accumulated;
            let from = source.as_ref();

            let slots = group.iter().map(|handler| async move {
                let context = self.engine.prepare_handoff(plan, from, handler, shared, None).await;
                self.invoke_slot(query, plan, handler, role, context, token).await
            });
            let group_results = join_all(slots).await;

            for result in &group_results {
                if let Some(output) = &result.output {
                    let produced_by = plan.domain_of(&result.handler).cloned();
                    accumulated.extend(output.context.iter().cloned().map(|mut element| {
                        if element.domain.is_none() {
                            element.domain = produced_by.clone();
                        }
                        element
                    }));
                }
            }
            if let Some(last) = group_results.iter().rev().find(|r| r.succeeded()) {
                source = Some(last.handler.clone());
            }
            results.extend(group_results);
        }
        results
    }

    /// One plan slot: the assigned handler, then its fallback once on failure
    async fn invoke_slot(
        &self,
        query: &Query,
        plan: &CoordinationPlan,
        handler: &HandlerId,
        role: HandoffRole,
        context: ContextBundle,
        token: &CancellationToken,
    ) -> HandlerResult {
        let started = Instant::now();

        let (served_by, attempts, outcome) = match self.invoke(query, plan, handler, role, context.clone(), token).await {
            Ok(output) => (handler.clone(), 1, Ok(output)),
            Err(error) => match self.retry_target(plan, handler, &error, token) {
                Some(fallback) => {
                    warn!(
                        plan_id = %plan.id,
                        handler = %handler,
                        fallback = %fallback,
                        error = %error,
                        "Handler failed, retrying with fallback"
                    );
                    metrics::counter!("conductor_dispatch_retries_total").increment(1);
                    let retried = self.invoke(query, plan, fallback, role, context, token).await;
                    (fallback.clone(), 2, retried)
                }
                None => (handler.clone(), 1, Err(error)),
            },
        };

        let (status, output, error) = match outcome {
            Ok(output) => (InvocationStatus::Succeeded, Some(output), None),
            Err(e) => (InvocationStatus::from_error(&e), None, Some(e.to_string())),
        };
        HandlerResult {
            handler: handler.clone(),
            served_by,
            role,
            status,
            attempts,
            output,
            error,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn retry_target<'p>(
        &self,
        plan: &'p CoordinationPlan,
        handler: &HandlerId,
        error: &HandlerError,
        token: &CancellationToken,
    ) -> Option<&'p HandlerId> {
        if !self.config.retry_once || token.is_cancelled() || matches!(error, HandlerError::Cancelled(_)) {
            return None;
        }
        plan.fallbacks.get(handler).filter(|fallback| *fallback != handler)
    }

    async fn invoke(
        &self,
        query: &Query,
        plan: &CoordinationPlan,
        id: &HandlerId,
        role: HandoffRole,
        context: ContextBundle,
        token: &CancellationToken,
    ) -> Result<HandlerOutput, HandlerError> {
        let result = self.attempt(query, plan, id, role, context, token).await;
        let status = match &result {
            Ok(_) => InvocationStatus::Succeeded,
            Err(e) => InvocationStatus::from_error(e),
        };
        metrics::counter!("conductor_dispatch_invocations_total", "status" => status.as_str()).increment(1);
        debug!(plan_id = %plan.id, handler = %id, status = status.as_str(), "Handler invocation finished");
        result
    }

    async fn attempt(
        &self,
        query: &Query,
        plan: &CoordinationPlan,
        id: &HandlerId,
        role: HandoffRole,
        context: ContextBundle,
        token: &CancellationToken,
    ) -> Result<HandlerOutput, HandlerError> {
        let handler = self
            .engine
            .registry()
            .resolve(id)
            .await
            .ok_or_else(|| HandlerError::Unavailable(id.clone()))?;
        let limits = handler.descriptor().limits.clone();
        let timeout = limits.timeout.unwrap_or(self.config.default_timeout);

        // Per-handler cap first, so a saturated handler does not pin global slots
        let handler_permits = self
            .handler_permits
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(limits.max_concurrency.max(1))))
            .value()
            .clone();
        let closed = || HandlerError::Failed {
            handler: id.clone(),
            reason: "dispatcher is shutting down".to_string(),
        };
        let _handler_permit = handler_permits.acquire().await.map_err(|_| closed())?;
        let _permit = self.permits.acquire().await.map_err(|_| closed())?;

        let request = HandoffRequest {
            plan_id: plan.id,
            query: query.text.clone(),
            attributes: query.attributes.clone(),
            role,
            context,
            cancellation: token.child_token(),
        };

        match tokio::time::timeout(timeout, handler.invoke(request)).await {
            Ok(result) => result,
            Err(_) => Err(HandlerError::Timeout {
                handler: id.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Role of every member of the group at `index`
fn role_for(strategy: CoordinationStrategy, index: usize) -> HandoffRole {
    match (strategy, index) {
        (CoordinationStrategy::Direct, _) => HandoffRole::Sole,
        (CoordinationStrategy::PrimarySecondary, 0) => HandoffRole::Primary,
        (CoordinationStrategy::PrimarySecondary, _) => HandoffRole::Validator,
        (CoordinationStrategy::Parallel, _) => HandoffRole::ParallelMember,
        (CoordinationStrategy::Hierarchical, 0) => HandoffRole::Coordinator,
        (CoordinationStrategy::Hierarchical, _) => HandoffRole::Specialist,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_follow_strategy_and_group() {
        assert_eq!(role_for(CoordinationStrategy::Direct, 0), HandoffRole::Sole);
        assert_eq!(role_for(CoordinationStrategy::PrimarySecondary, 0), HandoffRole::Primary);
        assert_eq!(role_for(CoordinationStrategy::PrimarySecondary, 1), HandoffRole::Validator);
        assert_eq!(role_for(CoordinationStrategy::Parallel, 0), HandoffRole::ParallelMember);
        assert_eq!(role_for(CoordinationStrategy::Hierarchical, 0), HandoffRole::Coordinator);
        assert_eq!(role_for(CoordinationStrategy::Hierarchical, 3), HandoffRole::Specialist);
    }
}
