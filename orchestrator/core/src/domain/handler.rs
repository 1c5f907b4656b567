// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Handler Domain Types
//!
//! Handlers are the external specialists a [`CoordinationPlan`](super::plan::CoordinationPlan)
//! dispatches to. The engine never reasons about what a handler does internally; it only
//! consumes the [`HandlerDescriptor`] each one publishes through a [`HandlerRegistry`]
//! and invokes it through the [`Handler`] capability interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::context::{ContextBundle, ContextElement};
use super::plan::PlanId;

/// Problem category with its own trigger vocabulary (e.g. `security`, `testing`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub String);

impl DomainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(pub String);

impl HandlerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a handler's trigger vocabulary.
///
/// `term` may be a single word or a phrase; each word matches as a prefix of a
/// query word, so `test` also matches `tests` and `testing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerTerm {
    pub term: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl TriggerTerm {
    pub fn new(term: impl Into<String>, weight: f64) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Per-invocation timeout; the dispatch default applies when absent
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Typical latency, used for plan cost estimates
    #[serde(default = "default_expected_latency_ms")]
    pub expected_latency_ms: u64,

    /// Maximum concurrent invocations of this handler
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_expected_latency_ms() -> u64 {
    500
}

fn default_max_concurrency() -> usize {
    1
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            timeout: None,
            expected_latency_ms: default_expected_latency_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Catalog entry published by the handler registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    pub id: HandlerId,
    pub capability: DomainId,
    #[serde(default)]
    pub triggers: Vec<TriggerTerm>,
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl HandlerDescriptor {
    pub fn new(id: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            id: HandlerId::new(id),
            capability: DomainId::new(capability),
            triggers: Vec::new(),
            limits: ResourceLimits::default(),
        }
    }

    pub fn with_trigger(mut self, term: impl Into<String>, weight: f64) -> Self {
        self.triggers.push(TriggerTerm::new(term, weight));
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Role a handler plays within the plan it is invoked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffRole {
    Sole,
    Primary,
    Validator,
    ParallelMember,
    Coordinator,
    Specialist,
}

/// Everything a handler receives for one invocation
#[derive(Debug, Clone)]
pub struct HandoffRequest {
    pub plan_id: PlanId,
    pub query: String,
    pub attributes: BTreeMap<String, String>,
    pub role: HandoffRole,
    pub context: ContextBundle,
    /// Cancelled when the caller abandons the coordination
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerOutput {
    pub summary: String,
    /// Context the handler contributes to later handoffs
    #[serde(default)]
    pub context: Vec<ContextElement>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Handler {handler} timed out after {timeout_ms}ms")]
    Timeout { handler: HandlerId, timeout_ms: u64 },

    #[error("Handler {handler} failed: {reason}")]
    Failed { handler: HandlerId, reason: String },

    #[error("Handler {0} was cancelled")]
    Cancelled(HandlerId),

    #[error("Handler {0} is not available in the registry")]
    Unavailable(HandlerId),
}

/// Capability interface implemented by every specialist
#[async_trait]
pub trait Handler: Send + Sync {
    fn descriptor(&self) -> &HandlerDescriptor;

    async fn invoke(&self, request: HandoffRequest) -> Result<HandlerOutput, HandlerError>;
}

/// Read-only catalog of available handlers
#[async_trait]
pub trait HandlerRegistry: Send + Sync {
    /// Snapshot of the catalog, in registration order
    async fn list_handlers(&self) -> anyhow::Result<Vec<HandlerDescriptor>>;

    /// Invocable implementation for `id`, if one is registered
    async fn resolve(&self, id: &HandlerId) -> Option<Arc<dyn Handler>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder() {
        let descriptor = HandlerDescriptor::new("sec-expert", "security")
            .with_trigger("vulnerability", 1.0)
            .with_trigger("auth", 0.8);

        assert_eq!(descriptor.id.as_str(), "sec-expert");
        assert_eq!(descriptor.capability, DomainId::new("security"));
        assert_eq!(descriptor.triggers.len(), 2);
        assert_eq!(descriptor.limits.max_concurrency, 1);
    }

    #[test]
    fn test_descriptor_yaml_defaults() {
        let yaml = r#"
id: perf
capability: performance
triggers:
  - term: latency
  - term: throughput
    weight: 0.7
limits:
  timeout: 2s
"#;
        let descriptor: HandlerDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(descriptor.triggers[0].weight, 1.0);
        assert_eq!(descriptor.triggers[1].weight, 0.7);
        assert_eq!(descriptor.limits.timeout, Some(Duration::from_secs(2)));
        assert_eq!(descriptor.limits.expected_latency_ms, 500);
    }
}
