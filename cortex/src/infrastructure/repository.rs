// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository interface for the learning store
//! Defines the contract for pattern persistence backends

use async_trait::async_trait;

use crate::domain::{Pattern, QuerySignature, SignatureClass, StoreError};

/// Result of rewriting an append log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    pub patterns: usize,
    pub lines_before: usize,
}

/// Durable key-value store of patterns keyed by query signature
#[async_trait]
pub trait PatternRepository: Send + Sync {
    /// Exact-signature point lookup
    async fn find_by_signature(
        &self,
        signature: &QuerySignature,
    ) -> Result<Option<Pattern>, StoreError>;

    /// Insert or replace the pattern stored under its signature
    async fn upsert(&self, pattern: &Pattern) -> Result<(), StoreError>;

    /// Bounded approximate search over signature classes, skipping deprecated
    /// patterns. Returns patterns with their token similarity (0.0-1.0), best first
    async fn find_similar(
        &self,
        class: &SignatureClass,
        limit: usize,
    ) -> Result<Vec<(Pattern, f64)>, StoreError>;

    /// Full-scan export for audit and backup
    async fn export_all(&self) -> Result<Vec<Pattern>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Rewrite backing storage, if the backend keeps a log
    async fn compact(&self) -> Result<Option<CompactionStats>, StoreError> {
        Ok(None)
    }
}
