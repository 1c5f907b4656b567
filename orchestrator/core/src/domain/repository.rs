// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for routing state owned by the core crate. Pattern
//! persistence lives in `conductor-cortex` (`PatternRepository`).
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `RelationshipRepository` | `DomainRelationship` | `InMemoryRelationshipRepository` |

use async_trait::async_trait;

use crate::domain::handler::DomainId;
use crate::domain::relationship::DomainRelationship;

/// Repository interface for the weighted domain relationship graph
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Edge connecting `a` to `b`, following bidirectional edges in reverse
    async fn find(&self, a: &DomainId, b: &DomainId) -> anyhow::Result<Option<DomainRelationship>>;

    /// Create or replace the edge keyed by (from, to)
    async fn upsert(&self, relationship: &DomainRelationship) -> anyhow::Result<()>;

    /// Edges leaving `domain`, bidirectional edges included from either end
    async fn neighbours(&self, domain: &DomainId) -> anyhow::Result<Vec<DomainRelationship>>;

    async fn all(&self) -> anyhow::Result<Vec<DomainRelationship>>;
}
