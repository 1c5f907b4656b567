// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Feedback Worker - asynchronous consumer of outcome reports
//!
//! Callers hand reports to a bounded [`FeedbackQueue`] and return at once; a
//! single [`FeedbackWorker`] applies them to the [`LearningService`]. This keeps
//! store write latency out of the request path. On shutdown the worker drains
//! what is already queued before stopping.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::{LearningService, RecordResult};
use crate::domain::OutcomeReport;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Feedback queue is full")]
    QueueFull,

    #[error("Feedback worker has stopped")]
    Closed,
}

/// Sending half handed to the routing engine
#[derive(Clone)]
pub struct FeedbackQueue {
    sender: mpsc::Sender<OutcomeReport>,
}

impl FeedbackQueue {
    /// Enqueue without waiting; a full queue is reported, never awaited
    pub fn submit(&self, report: OutcomeReport) -> Result<(), FeedbackError> {
        self.sender.try_send(report).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => FeedbackError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => FeedbackError::Closed,
        })
    }
}

pub struct FeedbackWorker {
    service: Arc<dyn LearningService>,
    receiver: mpsc::Receiver<OutcomeReport>,
    shutdown_token: CancellationToken,
}

/// Create a connected queue/worker pair
pub fn feedback_channel(
    service: Arc<dyn LearningService>,
    capacity: usize,
) -> (FeedbackQueue, FeedbackWorker) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        FeedbackQueue { sender },
        FeedbackWorker {
            service,
            receiver,
            shutdown_token: CancellationToken::new(),
        },
    )
}

impl FeedbackWorker {
    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(mut self) {
        info!("Starting learning feedback worker");

        loop {
            tokio::select! {
                maybe_report = self.receiver.recv() => {
                    match maybe_report {
                        Some(report) => self.apply(report).await,
                        None => break,
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    self.receiver.close();
                    while let Some(report) = self.receiver.recv().await {
                        self.apply(report).await;
                    }
                    break;
                }
            }
        }

        info!("Learning feedback worker stopped");
    }

    async fn apply(&self, report: OutcomeReport) {
        let signature = report.signature.short().to_string();
        match self.service.record_outcome(report).await {
            Ok(RecordResult::Coalesced) => debug!(signature = %signature, "Duplicate outcome coalesced"),
            Ok(_) => debug!(signature = %signature, "Outcome applied"),
            Err(e) => {
                metrics::counter!("conductor_learning_degraded_total", "operation" => "record_outcome")
                    .increment(1);
                warn!(signature = %signature, "Failed to apply outcome, continuing without learning: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{EventBus, StandardLearningService};
    use crate::domain::{LearningEvent, PlanSummary, QuerySignature, SignatureClass};
    use crate::infrastructure::InMemoryPatternRepository;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct NullBus;

    #[async_trait]
    impl EventBus for NullBus {
        async fn publish(&self, _event: LearningEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn report(success: bool) -> OutcomeReport {
        let text = "profile slow checkout endpoint";
        OutcomeReport {
            signature: QuerySignature::from_text(text),
            plan_id: Uuid::new_v4(),
            class: SignatureClass::from_text(text),
            plan: PlanSummary {
                strategy: "direct".to_string(),
                groups: vec![vec!["performance".to_string()]],
                rule: "single_domain".to_string(),
            },
            success,
            latency_ms: 25,
        }
    }

    #[tokio::test]
    async fn test_worker_drains_queue_on_shutdown() {
        let service = Arc::new(StandardLearningService::new(
            Arc::new(InMemoryPatternRepository::new()),
            Arc::new(NullBus),
        ));
        let (queue, worker) = feedback_channel(service.clone(), 16);
        let token = worker.shutdown_token();
        let handle = worker.start();

        for _ in 0..3 {
            queue.submit(report(true)).unwrap();
        }
        token.cancel();
        handle.await.unwrap();

        let pattern = service
            .lookup(&QuerySignature::from_text("profile slow checkout endpoint"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pattern.observations, 3);
    }

    #[tokio::test]
    async fn test_full_queue_is_reported() {
        let service = Arc::new(StandardLearningService::new(
            Arc::new(InMemoryPatternRepository::new()),
            Arc::new(NullBus),
        ));
        let (queue, _worker) = feedback_channel(service, 1);

        queue.submit(report(true)).unwrap();
        assert!(matches!(queue.submit(report(true)), Err(FeedbackError::QueueFull)));
    }

    #[tokio::test]
    async fn test_submit_after_worker_stops_is_closed() {
        let service = Arc::new(StandardLearningService::new(
            Arc::new(InMemoryPatternRepository::new()),
            Arc::new(NullBus),
        ));
        let (queue, worker) = feedback_channel(service, 4);
        drop(worker);

        assert!(matches!(queue.submit(report(true)), Err(FeedbackError::Closed)));
    }
}
