// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! File Pattern Store
//!
//! Durable pattern repository backed by an append-only JSON-lines log.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Persist patterns across restarts without blocking point reads
//!
//! Every upsert appends one line `{"checksum": <sha256 hex>, "payload": <pattern json>}`.
//! On open the log is replayed into an [`InMemoryPatternRepository`]; the last
//! line for a signature wins. A checksum mismatch or unparseable line is a
//! fatal [`StoreError::Corrupted`]: the store has to be rebuilt from an audit
//! export with [`FilePatternRepository::rebuild_from_export`].
//!
//! Reads never touch the file. Writes hold the append lock only for the
//! duration of one line; compaction holds it while the snapshot is rewritten.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{Pattern, QuerySignature, SignatureClass, StoreError};
use crate::infrastructure::memory_store::InMemoryPatternRepository;
use crate::infrastructure::repository::{CompactionStats, PatternRepository};

#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    checksum: String,
    payload: String,
}

impl LogEntry {
    fn seal(pattern: &Pattern) -> Result<Self, StoreError> {
        let payload = serde_json::to_string(pattern)?;
        Ok(Self {
            checksum: checksum(&payload),
            payload,
        })
    }

    fn to_line(&self) -> Result<String, StoreError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

fn checksum(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

pub struct FilePatternRepository {
    path: PathBuf,
    index: InMemoryPatternRepository,
    writer: Mutex<File>,
    lines: AtomicUsize,
}

impl FilePatternRepository {
    /// Open (or create) the log at `path`, verifying every line
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let index = InMemoryPatternRepository::new();
        let mut lines = 0usize;

        if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            for (number, raw) in content.lines().enumerate() {
                if raw.trim().is_empty() {
                    continue;
                }
                let pattern = verify_line(raw, number + 1)?;
                let newer = index
                    .get(&pattern.signature)
                    .map(|existing| pattern.version >= existing.version)
                    .unwrap_or(true);
                if newer {
                    index.insert(pattern);
                }
                lines += 1;
            }
            info!(path = %path.display(), lines, patterns = index.len(), "Loaded pattern log");
        }

        let writer = open_append(&path).await?;

        Ok(Self {
            path,
            index,
            writer: Mutex::new(writer),
            lines: AtomicUsize::new(lines),
        })
    }

    /// Recreate the log at `log_path` from a JSON export produced by [`Self::export_to`]
    pub async fn rebuild_from_export(
        export_path: impl AsRef<Path>,
        log_path: impl AsRef<Path>,
    ) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(export_path.as_ref()).await?;
        let patterns: Vec<Pattern> = serde_json::from_str(&content)?;

        let mut body = String::new();
        for pattern in &patterns {
            body.push_str(&LogEntry::seal(pattern)?.to_line()?);
        }
        tokio::fs::write(log_path.as_ref(), body).await?;

        info!(
            patterns = patterns.len(),
            log = %log_path.as_ref().display(),
            "Rebuilt pattern log from export"
        );
        Self::open(log_path).await
    }

    /// Write a pretty-printed JSON array of every pattern
    pub async fn export_to(&self, export_path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let patterns = self.index.snapshot();
        let json = serde_json::to_string_pretty(&patterns)?;
        tokio::fs::write(export_path.as_ref(), json).await?;
        Ok(patterns.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_lines(&self) -> usize {
        self.lines.load(Ordering::Relaxed)
    }
}

fn verify_line(raw: &str, line: usize) -> Result<Pattern, StoreError> {
    let entry: LogEntry = serde_json::from_str(raw).map_err(|e| StoreError::Corrupted {
        line,
        reason: format!("unreadable entry: {}", e),
    })?;

    if checksum(&entry.payload) != entry.checksum {
        return Err(StoreError::Corrupted {
            line,
            reason: "checksum mismatch".to_string(),
        });
    }

    serde_json::from_str(&entry.payload).map_err(|e| StoreError::Corrupted {
        line,
        reason: format!("invalid pattern payload: {}", e),
    })
}

async fn open_append(path: &Path) -> Result<File, StoreError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(file)
}

#[async_trait]
impl PatternRepository for FilePatternRepository {
    async fn find_by_signature(
        &self,
        signature: &QuerySignature,
    ) -> Result<Option<Pattern>, StoreError> {
        Ok(self.index.get(signature))
    }

    async fn upsert(&self, pattern: &Pattern) -> Result<(), StoreError> {
        let line = LogEntry::seal(pattern)?.to_line()?;

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        self.index.insert(pattern.clone());
        drop(writer);

        self.lines.fetch_add(1, Ordering::Relaxed);
        debug!(signature = pattern.signature.short(), version = pattern.version, "Appended pattern");
        Ok(())
    }

    async fn find_similar(
        &self,
        class: &SignatureClass,
        limit: usize,
    ) -> Result<Vec<(Pattern, f64)>, StoreError> {
        self.index.find_similar(class, limit).await
    }

    async fn export_all(&self) -> Result<Vec<Pattern>, StoreError> {
        Ok(self.index.snapshot())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.index.len())
    }

    async fn compact(&self) -> Result<Option<CompactionStats>, StoreError> {
        let mut writer = self.writer.lock().await;
        let lines_before = self.lines.load(Ordering::Relaxed);
        let patterns = self.index.snapshot();

        let mut body = String::new();
        for pattern in &patterns {
            body.push_str(&LogEntry::seal(pattern)?.to_line()?);
        }

        let staging = self.path.with_extension("compacting");
        tokio::fs::write(&staging, body).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        *writer = open_append(&self.path).await?;
        self.lines.store(patterns.len(), Ordering::Relaxed);

        Ok(Some(CompactionStats {
            patterns: patterns.len(),
            lines_before,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LifecyclePolicy, PlanSummary};
    use tempfile::tempdir;

    fn pattern(text: &str) -> Pattern {
        Pattern::new(
            QuerySignature::from_text(text),
            SignatureClass::from_text(text),
            PlanSummary {
                strategy: "parallel".to_string(),
                groups: vec![vec!["security".to_string(), "performance".to_string()]],
                rule: "parallel_fan_out".to_string(),
            },
            40,
            &LifecyclePolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_patterns_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.log");

        let mut p = pattern("container security testing");
        {
            let repo = FilePatternRepository::open(&path).await.unwrap();
            repo.upsert(&p).await.unwrap();
            p.record(true, 30, &LifecyclePolicy::default());
            repo.upsert(&p).await.unwrap();
            assert_eq!(repo.log_lines(), 2);
        }

        let reopened = FilePatternRepository::open(&path).await.unwrap();
        let found = reopened.find_by_signature(&p.signature).await.unwrap().unwrap();
        assert_eq!(found.observations, 2);
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tampered_line_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.log");
        {
            let repo = FilePatternRepository::open(&path).await.unwrap();
            repo.upsert(&pattern("container security testing")).await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("parallel_fan_out", "direct_dispatch")).unwrap();

        let err = FilePatternRepository::open(&path).await.err().unwrap();
        assert!(err.is_fatal());
        assert!(matches!(err, StoreError::Corrupted { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_compaction_keeps_one_line_per_signature() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.log");
        let repo = FilePatternRepository::open(&path).await.unwrap();

        let mut p = pattern("container security testing");
        repo.upsert(&p).await.unwrap();
        for _ in 0..5 {
            p.record(true, 30, &LifecyclePolicy::default());
            repo.upsert(&p).await.unwrap();
        }
        repo.upsert(&pattern("profile slow endpoint")).await.unwrap();

        let stats = repo.compact().await.unwrap().unwrap();
        assert_eq!(stats.lines_before, 7);
        assert_eq!(stats.patterns, 2);
        assert_eq!(repo.log_lines(), 2);

        // Appends continue to work after the rewrite
        p.record(false, 30, &LifecyclePolicy::default());
        repo.upsert(&p).await.unwrap();

        let reopened = FilePatternRepository::open(&path).await.unwrap();
        let found = reopened.find_by_signature(&p.signature).await.unwrap().unwrap();
        assert_eq!(found.observations, 7);
    }

    #[tokio::test]
    async fn test_rebuild_from_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.log");
        let export = dir.path().join("export.json");

        let repo = FilePatternRepository::open(&path).await.unwrap();
        repo.upsert(&pattern("container security testing")).await.unwrap();
        repo.upsert(&pattern("profile slow endpoint")).await.unwrap();
        assert_eq!(repo.export_to(&export).await.unwrap(), 2);

        let rebuilt_path = dir.path().join("rebuilt.log");
        let rebuilt = FilePatternRepository::rebuild_from_export(&export, &rebuilt_path)
            .await
            .unwrap();
        assert_eq!(rebuilt.count().await.unwrap(), 2);
    }
}
