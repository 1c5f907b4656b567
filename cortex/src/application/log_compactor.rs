// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pattern Log Compactor - Background task rewriting the append log
//!
//! The file store appends one line per outcome; this task periodically
//! rewrites it to one line per signature so replay on startup stays short.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Asynchronous compaction of the pattern store's append log

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::EventBus;
use crate::domain::LearningEvent;
use crate::infrastructure::PatternRepository;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the log compactor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogCompactorConfig {
    /// How often to run compaction
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Whether compaction is enabled
    pub enabled: bool,
}

impl Default for LogCompactorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            enabled: true,
        }
    }
}

pub struct LogCompactor {
    repository: Arc<dyn PatternRepository>,
    event_bus: Arc<dyn EventBus>,
    config: LogCompactorConfig,
    shutdown_token: CancellationToken,
}

impl LogCompactor {
    pub fn new(
        repository: Arc<dyn PatternRepository>,
        event_bus: Arc<dyn EventBus>,
        config: LogCompactorConfig,
    ) -> Self {
        Self {
            repository,
            event_bus,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the compactor background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("Pattern log compactor is disabled");
            return;
        }

        info!(
            interval = ?self.config.interval,
            "Starting pattern log compactor"
        );

        let mut tick = interval(self.config.interval.max(MIN_INTERVAL));
        // The first tick completes immediately; skip it so startup is not slowed by a rewrite
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running pattern log compaction");
                    if let Err(e) = self.compact_cycle().await {
                        warn!("Pattern log compaction failed: {}", e);
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping pattern log compactor");
                    break;
                }
            }
        }
    }

    /// Execute a single compaction; returns the number of patterns kept
    pub async fn compact_cycle(&self) -> Result<usize> {
        let started = Instant::now();

        let Some(stats) = self.repository.compact().await? else {
            debug!("Pattern repository has no log to compact");
            return Ok(0);
        };

        info!(
            patterns = stats.patterns,
            lines_before = stats.lines_before,
            "Pattern log compacted"
        );

        self.event_bus
            .publish(LearningEvent::LogCompacted {
                patterns: stats.patterns,
                lines_before: stats.lines_before,
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            })
            .await?;

        Ok(stats.patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LifecyclePolicy, Pattern, PlanSummary, QuerySignature, SignatureClass};
    use crate::infrastructure::{FilePatternRepository, InMemoryPatternRepository};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockEventBus {
        events: Mutex<Vec<LearningEvent>>,
    }

    #[async_trait]
    impl EventBus for MockEventBus {
        async fn publish(&self, event: LearningEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[test]
    fn test_default_config() {
        let config = LogCompactorConfig::default();
        assert_eq!(config.interval, Duration::from_secs(600));
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn test_memory_store_cycle_is_noop() {
        let bus = Arc::new(MockEventBus { events: Mutex::new(Vec::new()) });
        let compactor = LogCompactor::new(
            Arc::new(InMemoryPatternRepository::new()),
            bus.clone(),
            LogCompactorConfig::default(),
        );

        assert_eq!(compactor.compact_cycle().await.unwrap(), 0);
        assert!(bus.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_cycle_publishes_event() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(FilePatternRepository::open(dir.path().join("p.log")).await.unwrap());
        let policy = LifecyclePolicy::default();
        let text = "harden container image";
        let mut pattern = Pattern::new(
            QuerySignature::from_text(text),
            SignatureClass::from_text(text),
            PlanSummary {
                strategy: "direct".to_string(),
                groups: vec![vec!["containers".to_string()]],
                rule: "single_domain".to_string(),
            },
            10,
            &policy,
        );
        repo.upsert(&pattern).await.unwrap();
        pattern.record(true, 10, &policy);
        repo.upsert(&pattern).await.unwrap();

        let bus = Arc::new(MockEventBus { events: Mutex::new(Vec::new()) });
        let compactor = LogCompactor::new(repo.clone(), bus.clone(), LogCompactorConfig::default());

        assert_eq!(compactor.compact_cycle().await.unwrap(), 1);
        assert_eq!(repo.log_lines(), 1);
        let events = bus.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "log_compacted");
    }

    #[tokio::test]
    async fn test_compactor_stops_on_shutdown() {
        let bus = Arc::new(MockEventBus { events: Mutex::new(Vec::new()) });
        let compactor = Arc::new(LogCompactor::new(
            Arc::new(InMemoryPatternRepository::new()),
            bus,
            LogCompactorConfig {
                interval: Duration::ZERO,
                enabled: true,
            },
        ));
        let token = compactor.shutdown_token();
        let handle = compactor.start();

        token.cancel();
        handle.await.unwrap();
    }
}
