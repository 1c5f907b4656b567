// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pattern store wiring: backend selection from configuration and the
//! learning service built on top of it.

use conductor_cortex::{
    EventBus as LearningEventSink, FilePatternRepository, InMemoryPatternRepository, LogCompactor, PatternRepository,
    StandardLearningService, StoreError,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::domain::config::{LearningConfig, StoreBackend};
use crate::domain::errors::RoutingError;

/// Opened pattern store backend
#[derive(Clone)]
pub enum PatternStore {
    Memory(Arc<InMemoryPatternRepository>),
    File(Arc<FilePatternRepository>),
}

impl PatternStore {
    /// Open the configured backend. A log that fails its integrity check is
    /// fatal and surfaces as [`RoutingError::StoreCorrupted`].
    pub async fn open(config: &LearningConfig) -> Result<Self, RoutingError> {
        match config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory pattern store");
                Ok(PatternStore::Memory(Arc::new(InMemoryPatternRepository::new())))
            }
            StoreBackend::File => {
                let path = config.resolved_path();
                let repository = FilePatternRepository::open(&path)
                    .await
                    .map_err(|e| open_error(&path, e))?;
                info!(path = %path.display(), lines = repository.log_lines(), "Opened pattern log");
                Ok(PatternStore::File(Arc::new(repository)))
            }
        }
    }

    /// Replace a corrupted log with one rebuilt from an audit export
    pub async fn rebuild(config: &LearningConfig, export_path: impl Into<PathBuf>) -> Result<Self, RoutingError> {
        let export_path = export_path.into();
        let path = config.resolved_path();
        let repository = FilePatternRepository::rebuild_from_export(&export_path, &path)
            .await
            .map_err(|e| open_error(&path, e))?;
        Ok(PatternStore::File(Arc::new(repository)))
    }

    pub fn repository(&self) -> Arc<dyn PatternRepository> {
        match self {
            PatternStore::Memory(repo) => repo.clone(),
            PatternStore::File(repo) => repo.clone(),
        }
    }

    pub fn file(&self) -> Option<&Arc<FilePatternRepository>> {
        match self {
            PatternStore::File(repo) => Some(repo),
            PatternStore::Memory(_) => None,
        }
    }

    pub fn learning_service(&self, config: &LearningConfig, events: Arc<dyn LearningEventSink>) -> StandardLearningService {
        StandardLearningService::new(self.repository(), events)
            .with_policy(config.lifecycle.clone())
            .with_similarity_threshold(config.similarity_threshold)
            .with_seen_capacity(config.seen_capacity)
    }

    /// Background compactor for the file backend; the memory backend has no log
    pub fn compactor(&self, config: &LearningConfig, events: Arc<dyn LearningEventSink>) -> Option<Arc<LogCompactor>> {
        let file = self.file()?;
        if !config.compaction.enabled {
            return None;
        }
        Some(Arc::new(LogCompactor::new(
            file.clone(),
            events,
            config.compaction.clone(),
        )))
    }
}

fn open_error(path: &std::path::Path, error: StoreError) -> RoutingError {
    if error.is_fatal() {
        RoutingError::StoreCorrupted(error)
    } else {
        RoutingError::Configuration(format!("Failed to open pattern store at {}: {}", path.display(), error))
    }
}
