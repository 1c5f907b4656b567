// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cross-Domain Relationship Mapper
//!
//! Looks up relationship edges among the domains of a query, derives
//! transitive strength through bounded shortest-path search, and reinforces
//! or weakens edges from dispatch outcomes.
//!
//! Path cost is `-ln(strength)` per edge, so the cheapest path is the one with
//! the highest product of strengths. Search never expands a path beyond
//! `max_hops` edges and never revisits a domain already on the path.

use anyhow::Result;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::domain::conflict::DomainPair;
use crate::domain::handler::DomainId;
use crate::domain::relationship::{DomainRelationship, RelationshipKind, RelationshipPath};
use crate::domain::repository::RelationshipRepository;

#[derive(Debug, Clone, PartialEq)]
pub enum PathSearch {
    Found(RelationshipPath),
    NotFound,
    /// Every remaining route needed more than `max_hops` edges
    HopBoundExceeded,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipAnalysis {
    /// One entry per domain pair: the direct edge, or `Independent` with strength 0
    pub edges: Vec<DomainRelationship>,
    /// Transitive relationships for pairs without a direct edge
    pub paths: Vec<RelationshipPath>,
    /// Pairs whose search hit the hop bound
    pub overflows: Vec<DomainPair>,
    /// Pairs that depend on each other
    pub dependency_cycles: Vec<DomainPair>,
}

impl RelationshipAnalysis {
    /// Direct strength if an edge exists, otherwise transitive strength, otherwise 0
    pub fn strength_between(&self, a: &DomainId, b: &DomainId) -> f64 {
        if let Some(edge) = self
            .edges
            .iter()
            .find(|e| e.kind != RelationshipKind::Independent && (e.connects(a, b) || e.connects(b, a)))
        {
            return edge.strength;
        }
        self.paths
            .iter()
            .find(|p| (&p.from == a && &p.to == b) || (&p.from == b && &p.to == a))
            .map(|p| p.strength)
            .unwrap_or(0.0)
    }

    pub fn edges_of_kind(&self, kind: RelationshipKind) -> impl Iterator<Item = &DomainRelationship> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }
}

struct SearchState {
    cost: f64,
    hops: usize,
    node: DomainId,
    path: Vec<DomainId>,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchState {}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchState {
    // BinaryHeap is a max-heap; invert so the cheapest state pops first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.node.cmp(&self.node))
    }
}

pub struct RelationshipMapper {
    repository: Arc<dyn RelationshipRepository>,
    max_hops: usize,
    learning_rate: f64,
}

impl RelationshipMapper {
    pub fn new(repository: Arc<dyn RelationshipRepository>, max_hops: usize, learning_rate: f64) -> Self {
        Self {
            repository,
            max_hops: max_hops.max(1),
            learning_rate,
        }
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Explicitly register (or replace) a relationship
    pub async fn register(&self, relationship: DomainRelationship) -> Result<()> {
        debug!(
            from = %relationship.from,
            to = %relationship.to,
            kind = ?relationship.kind,
            strength = relationship.strength,
            "Registering domain relationship"
        );
        self.repository.upsert(&relationship).await
    }

    /// Strength of a direct edge in either direction, 0 when none exists
    pub async fn direct_strength(&self, a: &DomainId, b: &DomainId) -> Result<f64> {
        let forward = self.repository.find(a, b).await?;
        let backward = self.repository.find(b, a).await?;
        Ok(forward
            .into_iter()
            .chain(backward)
            .map(|edge| edge.strength)
            .fold(0.0, f64::max))
    }

    pub async fn analyze(&self, domains: &[DomainId]) -> Result<RelationshipAnalysis> {
        let mut analysis = RelationshipAnalysis::default();

        for (i, a) in domains.iter().enumerate() {
            for b in domains.iter().skip(i + 1) {
                let forward = self.repository.find(a, b).await?;
                let backward = self.repository.find(b, a).await?;

                let is_dependent =
                    |edge: &Option<DomainRelationship>| edge.as_ref().is_some_and(|e| e.kind == RelationshipKind::Dependent);
                if is_dependent(&forward) && is_dependent(&backward) {
                    analysis.dependency_cycles.push(DomainPair::new(a.clone(), b.clone()));
                }

                // A one-way b→a edge is still a relationship between the pair
                if let Some(edge) = forward.or(backward) {
                    analysis.edges.push(edge);
                    continue;
                }

                analysis.edges.push(DomainRelationship::independent(a.clone(), b.clone()));
                match self.find_path(a, b).await? {
                    PathSearch::Found(path) => analysis.paths.push(path),
                    PathSearch::NotFound => {}
                    PathSearch::HopBoundExceeded => {
                        debug!(from = %a, to = %b, max_hops = self.max_hops, "Relationship search hit hop bound");
                        analysis.overflows.push(DomainPair::new(a.clone(), b.clone()));
                    }
                }
            }
        }

        Ok(analysis)
    }

    /// Strongest path from `from` to `to` using at most `max_hops` edges
    pub async fn find_path(&self, from: &DomainId, to: &DomainId) -> Result<PathSearch> {
        let mut neighbour_cache: HashMap<DomainId, Vec<DomainRelationship>> = HashMap::new();
        let mut best: HashMap<(DomainId, usize), f64> = HashMap::new();
        let mut heap = BinaryHeap::new();
        let mut hit_bound = false;

        heap.push(SearchState {
            cost: 0.0,
            hops: 0,
            node: from.clone(),
            path: vec![from.clone()],
        });

        while let Some(state) = heap.pop() {
            if &state.node == to && state.hops > 0 {
                return Ok(PathSearch::Found(RelationshipPath {
                    from: from.clone(),
                    to: to.clone(),
                    strength: (-state.cost).exp().clamp(0.0, 1.0),
                    hops: state.path,
                }));
            }

            if !neighbour_cache.contains_key(&state.node) {
                let edges = self.repository.neighbours(&state.node).await?;
                neighbour_cache.insert(state.node.clone(), edges);
            }
            let edges = neighbour_cache.get(&state.node).map(Vec::as_slice).unwrap_or(&[]);

            for edge in edges {
                if edge.strength <= 0.0 || edge.kind == RelationshipKind::Independent {
                    continue;
                }
                if state.path.contains(&edge.to) {
                    continue;
                }
                if state.hops >= self.max_hops {
                    hit_bound = true;
                    continue;
                }

                let cost = state.cost - edge.strength.ln();
                let key = (edge.to.clone(), state.hops + 1);
                if best.get(&key).is_some_and(|known| *known <= cost) {
                    continue;
                }
                best.insert(key, cost);

                let mut path = state.path.clone();
                path.push(edge.to.clone());
                heap.push(SearchState {
                    cost,
                    hops: state.hops + 1,
                    node: edge.to.clone(),
                    path,
                });
            }
        }

        Ok(if hit_bound {
            PathSearch::HopBoundExceeded
        } else {
            PathSearch::NotFound
        })
    }

    /// Apply one outcome to every pair of co-dispatched domains.
    ///
    /// Returns the updated edges with the applied strength delta.
    pub async fn reinforce(&self, domains: &[DomainId], success: bool) -> Result<Vec<(DomainRelationship, f64)>> {
        let mut updated = Vec::new();

        for (i, a) in domains.iter().enumerate() {
            for b in domains.iter().skip(i + 1) {
                let existing = match self.repository.find(a, b).await? {
                    Some(edge) => Some(edge),
                    None => self.repository.find(b, a).await?,
                };

                let mut edge = match existing {
                    Some(edge) => edge,
                    // Failures never create edges
                    None if !success => continue,
                    None => DomainRelationship::new(a.clone(), b.clone(), RelationshipKind::Synergistic, 0.0, true),
                };

                let delta = edge.apply_outcome(success, self.learning_rate);
                self.repository.upsert(&edge).await?;
                updated.push((edge, delta));
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::relationship_store::InMemoryRelationshipRepository;

    fn d(name: &str) -> DomainId {
        DomainId::new(name)
    }

    async fn chain(len: usize, strength: f64) -> Arc<InMemoryRelationshipRepository> {
        let repo = Arc::new(InMemoryRelationshipRepository::new());
        for i in 0..len {
            repo.upsert(&DomainRelationship::new(
                d(&format!("n{}", i)),
                d(&format!("n{}", i + 1)),
                RelationshipKind::Sequential,
                strength,
                false,
            ))
            .await
            .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_unknown_pair_is_independent() {
        let mapper = RelationshipMapper::new(Arc::new(InMemoryRelationshipRepository::new()), 4, 0.1);
        let analysis = mapper.analyze(&[d("security"), d("testing")]).await.unwrap();

        assert_eq!(analysis.edges.len(), 1);
        assert_eq!(analysis.edges[0].kind, RelationshipKind::Independent);
        assert_eq!(analysis.edges[0].strength, 0.0);
        assert_eq!(analysis.strength_between(&d("security"), &d("testing")), 0.0);
    }

    #[tokio::test]
    async fn test_transitive_path_multiplies_strengths() {
        let mapper = RelationshipMapper::new(chain(3, 0.5).await, 4, 0.1);
        match mapper.find_path(&d("n0"), &d("n3")).await.unwrap() {
            PathSearch::Found(path) => {
                assert_eq!(path.hops.len(), 4);
                assert!((path.strength - 0.125).abs() < 1e-9);
            }
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_strongest_path_wins() {
        let repo = Arc::new(InMemoryRelationshipRepository::new());
        for (from, to, s) in [("a", "b", 0.9), ("b", "d", 0.9), ("a", "c", 0.3), ("c", "d", 1.0), ("a", "d", 0.5)] {
            repo.upsert(&DomainRelationship::new(d(from), d(to), RelationshipKind::Dependent, s, false))
                .await
                .unwrap();
        }
        let mapper = RelationshipMapper::new(repo, 4, 0.1);
        match mapper.find_path(&d("a"), &d("d")).await.unwrap() {
            PathSearch::Found(path) => {
                assert_eq!(path.hops, vec![d("a"), d("b"), d("d")]);
                assert!((path.strength - 0.81).abs() < 1e-9);
            }
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_long_chain_exceeds_hop_bound() {
        let mapper = RelationshipMapper::new(chain(6, 0.9).await, 4, 0.1);
        assert_eq!(mapper.find_path(&d("n0"), &d("n6")).await.unwrap(), PathSearch::HopBoundExceeded);

        let analysis = mapper.analyze(&[d("n0"), d("n6")]).await.unwrap();
        assert_eq!(analysis.overflows, vec![DomainPair::new(d("n0"), d("n6"))]);
        assert_eq!(analysis.strength_between(&d("n0"), &d("n6")), 0.0);
    }

    #[tokio::test]
    async fn test_cyclic_graph_terminates() {
        let repo = Arc::new(InMemoryRelationshipRepository::new());
        for (from, to) in [("a", "b"), ("b", "c"), ("c", "a")] {
            repo.upsert(&DomainRelationship::new(d(from), d(to), RelationshipKind::Dependent, 0.8, true))
                .await
                .unwrap();
        }
        let mapper = RelationshipMapper::new(repo, 4, 0.1);
        assert_eq!(mapper.find_path(&d("a"), &d("z")).await.unwrap(), PathSearch::NotFound);
    }

    #[tokio::test]
    async fn test_mutual_dependency_is_reported() {
        let repo = Arc::new(InMemoryRelationshipRepository::new());
        repo.upsert(&DomainRelationship::new(d("database"), d("architecture"), RelationshipKind::Dependent, 0.7, false))
            .await
            .unwrap();
        repo.upsert(&DomainRelationship::new(d("architecture"), d("database"), RelationshipKind::Dependent, 0.5, false))
            .await
            .unwrap();
        let mapper = RelationshipMapper::new(repo, 4, 0.1);

        let analysis = mapper.analyze(&[d("architecture"), d("database")]).await.unwrap();
        assert_eq!(analysis.dependency_cycles, vec![DomainPair::new(d("architecture"), d("database"))]);
        assert_eq!(analysis.strength_between(&d("database"), &d("architecture")), 0.5);
    }

    #[tokio::test]
    async fn test_reinforcement_is_bounded_and_creates_edges_on_success() {
        let repo = Arc::new(InMemoryRelationshipRepository::new());
        let mapper = RelationshipMapper::new(repo.clone(), 4, 0.2);
        let domains = [d("security"), d("containers"), d("testing")];

        let updated = mapper.reinforce(&domains, true).await.unwrap();
        assert_eq!(updated.len(), 3);
        for (edge, delta) in &updated {
            assert!(delta.abs() <= 0.2);
            assert_eq!(edge.kind, RelationshipKind::Synergistic);
        }

        let weakened = mapper.reinforce(&domains, false).await.unwrap();
        assert_eq!(weakened.len(), 3);
        assert!(weakened.iter().all(|(_, delta)| *delta < 0.0 && delta.abs() <= 0.2));

        // A failure on an unrelated pair creates nothing
        let none = mapper.reinforce(&[d("x"), d("y")], false).await.unwrap();
        assert!(none.is_empty());
        assert_eq!(repo.all().await.unwrap().len(), 3);
    }
}
