// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # LearningService: Pattern Learning & Success Store
//!
//! Application service behind `record_outcome` / `lookup`. Every dispatched
//! coordination plan eventually reports an outcome; the service folds it into
//! the [`Pattern`] stored under the query signature.
//!
//! ## Write discipline
//!
//! Updates are serialized per signature through a keyed async mutex, so two
//! concurrent reports for the same signature never interleave their
//! read-modify-write. Reports for different signatures proceed in parallel.
//! Reads never take the key lock.
//!
//! ## Idempotency
//!
//! Reports are keyed by `(signature, plan_id)`. A bounded set of applied keys
//! coalesces duplicates, which are acknowledged but not counted again.
//!
//! ## Creation rule
//!
//! A pattern is created only when no pattern exists for the signature and the
//! outcome was a success. A failure for an unknown signature is ignored.

use async_trait::async_trait;
use anyhow::Result;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    LearningEvent, LifecyclePolicy, OutcomeReport, Pattern, QuerySignature, SignatureClass,
    TierTransition,
};
use crate::infrastructure::PatternRepository;

const DEFAULT_SEEN_CAPACITY: usize = 10_000;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;
const SIMILAR_SEARCH_LIMIT: usize = 5;

/// Event bus trait for publishing learning events
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: LearningEvent) -> Result<()>;
}

/// What happened to one outcome report
#[derive(Debug, Clone)]
pub enum RecordResult {
    Created(Pattern),
    Updated {
        pattern: Pattern,
        transition: Option<TierTransition>,
    },
    /// Failure for a signature that has no pattern yet
    Ignored,
    /// Duplicate `(signature, plan_id)` report
    Coalesced,
}

#[async_trait]
pub trait LearningService: Send + Sync {
    /// Fold an outcome into the pattern for its signature
    async fn record_outcome(&self, report: OutcomeReport) -> Result<RecordResult>;

    /// Exact-signature lookup; deprecated patterns are excluded
    async fn lookup(&self, signature: &QuerySignature) -> Result<Option<Pattern>>;

    /// Nearest signature-class match above the similarity threshold; deprecated patterns are excluded
    async fn lookup_similar(&self, class: &SignatureClass) -> Result<Option<(Pattern, f64)>>;

    /// Exact-signature lookup including deprecated patterns
    async fn audit_lookup(&self, signature: &QuerySignature) -> Result<Option<Pattern>>;

    /// Full export for audit and backup
    async fn export_patterns(&self) -> Result<Vec<Pattern>>;
}

/// Bounded FIFO set of applied report keys
struct SeenOutcomes {
    keys: HashSet<(QuerySignature, Uuid)>,
    order: VecDeque<(QuerySignature, Uuid)>,
    capacity: usize,
}

impl SeenOutcomes {
    fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns false when the key was already present
    fn insert(&mut self, key: (QuerySignature, Uuid)) -> bool {
        if !self.keys.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.keys.remove(&evicted);
            }
        }
        true
    }

    fn remove(&mut self, key: &(QuerySignature, Uuid)) {
        if self.keys.remove(key) {
            self.order.retain(|k| k != key);
        }
    }
}

/// Standard implementation of LearningService
pub struct StandardLearningService {
    pattern_repo: Arc<dyn PatternRepository>,
    event_bus: Arc<dyn EventBus>,
    policy: LifecyclePolicy,
    similarity_threshold: f64,
    key_locks: DashMap<QuerySignature, Arc<Mutex<()>>>,
    seen: SyncMutex<SeenOutcomes>,
}

impl StandardLearningService {
    pub fn new(pattern_repo: Arc<dyn PatternRepository>, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            pattern_repo,
            event_bus,
            policy: LifecyclePolicy::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            key_locks: DashMap::new(),
            seen: SyncMutex::new(SeenOutcomes::new(DEFAULT_SEEN_CAPACITY)),
        }
    }

    pub fn with_policy(mut self, policy: LifecyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_seen_capacity(self, capacity: usize) -> Self {
        *self.seen.lock() = SeenOutcomes::new(capacity);
        self
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    fn key_lock(&self, signature: &QuerySignature) -> Arc<Mutex<()>> {
        self.key_locks
            .entry(signature.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn apply(&self, report: &OutcomeReport) -> Result<RecordResult> {
        let lock = self.key_lock(&report.signature);
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(report).await
        };
        drop(lock);
        // Only the map still holds the lock once every writer for this key is done
        self.key_locks
            .remove_if(&report.signature, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn apply_locked(&self, report: &OutcomeReport) -> Result<RecordResult> {
        let existing = self.pattern_repo.find_by_signature(&report.signature).await?;

        match existing {
            Some(mut pattern) => {
                let old_success_rate = pattern.success_rate;
                let transition = pattern.record(report.success, report.latency_ms, &self.policy);
                self.pattern_repo.upsert(&pattern).await?;

                self.event_bus
                    .publish(LearningEvent::PatternOutcomeRecorded {
                        pattern_id: pattern.id,
                        success: report.success,
                        old_success_rate,
                        new_success_rate: pattern.success_rate,
                        observations: pattern.observations,
                        timestamp: Utc::now(),
                    })
                    .await?;

                if let Some(t) = transition {
                    info!(
                        signature = pattern.signature.short(),
                        from = %t.from,
                        to = %t.to,
                        "Pattern tier changed"
                    );
                    self.event_bus
                        .publish(LearningEvent::PatternTierChanged {
                            pattern_id: pattern.id,
                            from: t.from,
                            to: t.to,
                            timestamp: Utc::now(),
                        })
                        .await?;
                }

                Ok(RecordResult::Updated { pattern, transition })
            }
            None if report.success => {
                let pattern = Pattern::new(
                    report.signature.clone(),
                    report.class.clone(),
                    report.plan.clone(),
                    report.latency_ms,
                    &self.policy,
                );
                self.pattern_repo.upsert(&pattern).await?;

                self.event_bus
                    .publish(LearningEvent::PatternDiscovered {
                        pattern_id: pattern.id,
                        signature: pattern.signature.to_string(),
                        strategy: pattern.plan.strategy.clone(),
                        timestamp: Utc::now(),
                    })
                    .await?;

                Ok(RecordResult::Created(pattern))
            }
            None => {
                self.event_bus
                    .publish(LearningEvent::OutcomeIgnored {
                        signature: report.signature.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await?;
                Ok(RecordResult::Ignored)
            }
        }
    }
}

#[async_trait]
impl LearningService for StandardLearningService {
    async fn record_outcome(&self, report: OutcomeReport) -> Result<RecordResult> {
        let key = report.key();

        if !self.seen.lock().insert(key.clone()) {
            debug!(signature = report.signature.short(), plan_id = %report.plan_id, "Coalesced duplicate outcome");
            self.event_bus
                .publish(LearningEvent::OutcomeCoalesced {
                    signature: report.signature.to_string(),
                    plan_id: report.plan_id,
                    timestamp: Utc::now(),
                })
                .await?;
            return Ok(RecordResult::Coalesced);
        }

        match self.apply(&report).await {
            Ok(result) => Ok(result),
            Err(e) => {
                // Not applied, so a retry of the same report must not be coalesced
                self.seen.lock().remove(&key);
                Err(e)
            }
        }
    }

    async fn lookup(&self, signature: &QuerySignature) -> Result<Option<Pattern>> {
        let started = Instant::now();
        let found = self.pattern_repo.find_by_signature(signature).await?;
        metrics::histogram!("conductor_pattern_lookup_latency_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);

        Ok(found.filter(|p| !p.is_deprecated()))
    }

    async fn lookup_similar(&self, class: &SignatureClass) -> Result<Option<(Pattern, f64)>> {
        let candidates = self
            .pattern_repo
            .find_similar(class, SIMILAR_SEARCH_LIMIT)
            .await?;

        Ok(candidates
            .into_iter()
            .find(|(p, similarity)| !p.is_deprecated() && *similarity >= self.similarity_threshold))
    }

    async fn audit_lookup(&self, signature: &QuerySignature) -> Result<Option<Pattern>> {
        Ok(self.pattern_repo.find_by_signature(signature).await?)
    }

    async fn export_patterns(&self) -> Result<Vec<Pattern>> {
        Ok(self.pattern_repo.export_all().await?)
    }
}
