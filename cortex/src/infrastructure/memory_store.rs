// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory pattern repository
//!
//! Patterns live in a sharded [`DashMap`] keyed by signature, so exact
//! lookups are O(1) and writers to different signatures never contend on the
//! same shard lock. A token → signatures inverted index backs the approximate
//! class search; every token bucket is capped, which bounds the number of
//! candidates a similarity search ever inspects.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;

use crate::domain::{Pattern, QuerySignature, SignatureClass, StoreError};
use crate::infrastructure::repository::PatternRepository;

const DEFAULT_MAX_SIGNATURES_PER_TOKEN: usize = 32;
const DEFAULT_MAX_CANDIDATES: usize = 64;

pub struct InMemoryPatternRepository {
    patterns: DashMap<QuerySignature, Pattern>,
    token_index: DashMap<String, Vec<QuerySignature>>,
    max_signatures_per_token: usize,
    max_candidates: usize,
}

impl InMemoryPatternRepository {
    pub fn new() -> Self {
        Self {
            patterns: DashMap::new(),
            token_index: DashMap::new(),
            max_signatures_per_token: DEFAULT_MAX_SIGNATURES_PER_TOKEN,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    pub fn with_search_bounds(mut self, per_token: usize, max_candidates: usize) -> Self {
        self.max_signatures_per_token = per_token.max(1);
        self.max_candidates = max_candidates.max(1);
        self
    }

    /// Synchronous upsert used while replaying a log on load
    pub(crate) fn insert(&self, pattern: Pattern) {
        let signature = pattern.signature.clone();
        let tokens: Vec<String> = pattern.class.tokens.iter().cloned().collect();
        let previous = self.patterns.insert(signature.clone(), pattern);

        if previous.is_none() {
            for token in tokens {
                let mut bucket = self.token_index.entry(token).or_default();
                if bucket.len() >= self.max_signatures_per_token {
                    bucket.remove(0);
                }
                bucket.push(signature.clone());
            }
        }
    }

    pub(crate) fn get(&self, signature: &QuerySignature) -> Option<Pattern> {
        self.patterns.get(signature).map(|entry| entry.value().clone())
    }

    pub(crate) fn snapshot(&self) -> Vec<Pattern> {
        let mut all: Vec<Pattern> = self
            .patterns
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.signature.cmp(&b.signature));
        all
    }

    pub(crate) fn len(&self) -> usize {
        self.patterns.len()
    }

    fn candidate_signatures(&self, class: &SignatureClass) -> Vec<QuerySignature> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        'tokens: for token in &class.tokens {
            if let Some(bucket) = self.token_index.get(token) {
                for signature in bucket.iter().rev() {
                    if seen.insert(signature.clone()) {
                        candidates.push(signature.clone());
                        if candidates.len() >= self.max_candidates {
                            break 'tokens;
                        }
                    }
                }
            }
        }

        candidates
    }
}

impl Default for InMemoryPatternRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PatternRepository for InMemoryPatternRepository {
    async fn find_by_signature(
        &self,
        signature: &QuerySignature,
    ) -> Result<Option<Pattern>, StoreError> {
        Ok(self.get(signature))
    }

    async fn upsert(&self, pattern: &Pattern) -> Result<(), StoreError> {
        self.insert(pattern.clone());
        Ok(())
    }

    async fn find_similar(
        &self,
        class: &SignatureClass,
        limit: usize,
    ) -> Result<Vec<(Pattern, f64)>, StoreError> {
        if class.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(Pattern, f64)> = self
            .candidate_signatures(class)
            .into_iter()
            .filter_map(|signature| self.get(&signature))
            .filter(|pattern| !pattern.is_deprecated())
            .map(|pattern| {
                let similarity = class.similarity(&pattern.class);
                (pattern, similarity)
            })
            .filter(|(_, similarity)| *similarity > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.signature.cmp(&b.0.signature))
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn export_all(&self) -> Result<Vec<Pattern>, StoreError> {
        Ok(self.snapshot())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LifecyclePolicy, PlanSummary};

    fn pattern(text: &str) -> Pattern {
        Pattern::new(
            QuerySignature::from_text(text),
            SignatureClass::from_text(text),
            PlanSummary {
                strategy: "direct".to_string(),
                groups: vec![vec!["h".to_string()]],
                rule: "single_domain".to_string(),
            },
            10,
            &LifecyclePolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let repo = InMemoryPatternRepository::new();
        let p = pattern("fix failing async test");

        repo.upsert(&p).await.unwrap();

        let found = repo.find_by_signature(&p.signature).await.unwrap();
        assert_eq!(found.unwrap().id, p.id);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_instead_of_duplicating() {
        let repo = InMemoryPatternRepository::new();
        let mut p = pattern("fix failing async test");
        repo.upsert(&p).await.unwrap();

        p.record(true, 10, &LifecyclePolicy::default());
        repo.upsert(&p).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        let found = repo.find_by_signature(&p.signature).await.unwrap().unwrap();
        assert_eq!(found.observations, 2);
    }

    #[tokio::test]
    async fn test_find_similar_ranks_by_overlap() {
        let repo = InMemoryPatternRepository::new();
        repo.upsert(&pattern("fix failing async test")).await.unwrap();
        repo.upsert(&pattern("optimize database query latency")).await.unwrap();

        let query = SignatureClass::from_text("failing async test in ci");
        let results = repo.find_similar(&query, 5).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].1 > 0.5);
    }

    #[tokio::test]
    async fn test_search_is_bounded_by_candidate_cap() {
        let repo = InMemoryPatternRepository::new().with_search_bounds(4, 3);
        for i in 0..10 {
            repo.upsert(&pattern(&format!("shared token variant{}", i))).await.unwrap();
        }

        let query = SignatureClass::from_tokens(["shared", "token"]);
        let results = repo.find_similar(&query, 100).await.unwrap();
        assert!(results.len() <= 3);
    }
}
