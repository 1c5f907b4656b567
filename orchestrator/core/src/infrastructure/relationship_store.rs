// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory relationship graph repository

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::config::RelationshipSeed;
use crate::domain::handler::DomainId;
use crate::domain::relationship::DomainRelationship;
use crate::domain::repository::RelationshipRepository;

type EdgeKey = (DomainId, DomainId);

/// Edges keyed by (from, to); a bidirectional edge is stored once
pub struct InMemoryRelationshipRepository {
    edges: Arc<RwLock<HashMap<EdgeKey, DomainRelationship>>>,
}

impl InMemoryRelationshipRepository {
    pub fn new() -> Self {
        Self {
            edges: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build a graph pre-populated from configured seeds
    pub fn seeded(seeds: &[RelationshipSeed]) -> Self {
        let edges = seeds
            .iter()
            .map(|seed| {
                let rel = DomainRelationship::new(
                    DomainId::new(seed.from.clone()),
                    DomainId::new(seed.to.clone()),
                    seed.kind,
                    seed.strength,
                    seed.bidirectional,
                );
                ((rel.from.clone(), rel.to.clone()), rel)
            })
            .collect();

        Self {
            edges: Arc::new(RwLock::new(edges)),
        }
    }
}

impl Default for InMemoryRelationshipRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// View a bidirectional edge from its `to` end
fn reversed(rel: &DomainRelationship) -> DomainRelationship {
    DomainRelationship {
        from: rel.to.clone(),
        to: rel.from.clone(),
        ..rel.clone()
    }
}

#[async_trait]
impl RelationshipRepository for InMemoryRelationshipRepository {
    async fn find(&self, a: &DomainId, b: &DomainId) -> Result<Option<DomainRelationship>> {
        let edges = self.edges.read().await;

        if let Some(rel) = edges.get(&(a.clone(), b.clone())) {
            return Ok(Some(rel.clone()));
        }
        Ok(edges
            .get(&(b.clone(), a.clone()))
            .filter(|rel| rel.bidirectional)
            .map(reversed))
    }

    async fn upsert(&self, relationship: &DomainRelationship) -> Result<()> {
        let mut edges = self.edges.write().await;
        let forward = (relationship.from.clone(), relationship.to.clone());
        let backward = (relationship.to.clone(), relationship.from.clone());

        // Updating a bidirectional edge through its reverse view keeps the stored orientation
        if !edges.contains_key(&forward) {
            if let Some(existing) = edges.get(&backward) {
                if existing.bidirectional {
                    edges.insert(backward, reversed(relationship));
                    return Ok(());
                }
            }
        }

        edges.insert(forward, relationship.clone());
        Ok(())
    }

    async fn neighbours(&self, domain: &DomainId) -> Result<Vec<DomainRelationship>> {
        let edges = self.edges.read().await;
        let mut result: Vec<DomainRelationship> = edges
            .values()
            .filter_map(|rel| {
                if &rel.from == domain {
                    Some(rel.clone())
                } else if rel.bidirectional && &rel.to == domain {
                    Some(reversed(rel))
                } else {
                    None
                }
            })
            .collect();
        // HashMap iteration order is arbitrary; keep traversal deterministic
        result.sort_by(|a, b| a.to.cmp(&b.to));
        Ok(result)
    }

    async fn all(&self) -> Result<Vec<DomainRelationship>> {
        let edges = self.edges.read().await;
        let mut result: Vec<DomainRelationship> = edges.values().cloned().collect();
        result.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        Ok(result)
    }
}
