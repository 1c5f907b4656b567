// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

/// Failures of the persisted pattern store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient read/write failure; callers proceed without learning augmentation
    #[error("Pattern store unavailable: {0}")]
    Unavailable(String),

    /// Integrity check failed while loading; the store must be rebuilt from an audit export
    #[error("Pattern store corrupted at line {line}: {reason}")]
    Corrupted { line: usize, reason: String },

    #[error("Pattern store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pattern serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Only corruption detected on load is fatal
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Corrupted { .. })
    }
}
