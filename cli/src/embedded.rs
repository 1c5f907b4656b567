// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Embedded router
//!
//! Builds the routing engine, pattern store and background workers
//! in-process from a router configuration manifest.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use conductor_core::{
    application::engine::RoutingEngine,
    domain::{
        config::RouterConfigManifest,
        handler::{Handler, HandlerDescriptor, HandlerError, HandlerOutput, HandlerRegistry, HandoffRequest},
    },
    infrastructure::{
        event_bus::EventBus,
        handler_registry::{CachedHandlerRegistry, StaticHandlerRegistry},
        pattern_store::PatternStore,
        relationship_store::InMemoryRelationshipRepository,
    },
};
use conductor_cortex::{feedback_channel, LearningService};
use conductor_swarm::PlanDispatcher;

/// Acknowledges every handoff without doing work; used for `--simulate`
struct LoopbackHandler {
    descriptor: HandlerDescriptor,
}

#[async_trait]
impl Handler for LoopbackHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: HandoffRequest) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput {
            summary: format!(
                "{} acknowledged as {:?} with {} context element(s)",
                self.descriptor.id,
                request.role,
                request.context.elements.len()
            ),
            context: Vec::new(),
        })
    }
}

pub struct EmbeddedRouter {
    manifest: RouterConfigManifest,
    engine: Arc<RoutingEngine>,
    learning: Arc<dyn LearningService>,
    store: PatternStore,
    event_bus: EventBus,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl EmbeddedRouter {
    pub async fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let manifest =
            RouterConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
        Self::from_manifest(manifest, false).await
    }

    /// Build the router. With `simulate`, every declared handler is backed by
    /// a loopback implementation so plans can be dispatched end to end.
    pub async fn from_manifest(manifest: RouterConfigManifest, simulate: bool) -> Result<Self> {
        manifest.validate().context("Configuration validation failed")?;
        let spec = &manifest.spec;

        let event_bus = EventBus::with_default_capacity();
        let store = PatternStore::open(&spec.learning)
            .await
            .context("Failed to open pattern store")?;
        let learning: Arc<dyn LearningService> =
            Arc::new(store.learning_service(&spec.learning, Arc::new(event_bus.clone())));

        let shutdown = CancellationToken::new();
        let mut workers = Vec::new();

        let (queue, worker) = feedback_channel(learning.clone(), spec.learning.feedback_queue_capacity);
        let worker_shutdown = worker.shutdown_token();
        workers.push(worker.start());
        let cascade = shutdown.clone();
        workers.push(tokio::spawn(async move {
            cascade.cancelled().await;
            worker_shutdown.cancel();
        }));

        if let Some(compactor) = store.compactor(&spec.learning, Arc::new(event_bus.clone())) {
            let compactor_shutdown = compactor.shutdown_token();
            workers.push(compactor.start());
            let cascade = shutdown.clone();
            workers.push(tokio::spawn(async move {
                cascade.cancelled().await;
                compactor_shutdown.cancel();
            }));
        }

        let mut registry = StaticHandlerRegistry::from_config(&spec.registry);
        if simulate {
            for descriptor in &spec.registry.handlers {
                registry = registry.with_handler(Arc::new(LoopbackHandler {
                    descriptor: descriptor.clone(),
                }));
            }
        }
        let registry: Arc<dyn HandlerRegistry> =
            Arc::new(CachedHandlerRegistry::new(Arc::new(registry), spec.registry.refresh_interval));

        let engine = RoutingEngine::new(
            spec,
            registry,
            learning.clone(),
            Arc::new(InMemoryRelationshipRepository::seeded(&spec.relationships.seed)),
            event_bus.clone(),
        )
        .context("Failed to build routing engine")?
        .with_feedback_queue(queue);

        info!(
            handlers = spec.registry.handlers.len(),
            backend = ?spec.learning.backend,
            simulate,
            "Embedded router ready"
        );

        Ok(Self {
            manifest,
            engine: Arc::new(engine),
            learning,
            store,
            event_bus,
            shutdown,
            workers,
        })
    }

    pub fn manifest(&self) -> &RouterConfigManifest {
        &self.manifest
    }

    pub fn engine(&self) -> &Arc<RoutingEngine> {
        &self.engine
    }

    pub fn learning(&self) -> &Arc<dyn LearningService> {
        &self.learning
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn dispatcher(&self) -> PlanDispatcher {
        PlanDispatcher::new(self.engine.clone())
    }

    /// Stop background workers, draining queued outcome reports first
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        for worker in self.workers {
            worker.await.context("Background worker panicked")?;
        }
        debug!("Embedded router stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::domain::config::StoreBackend;
    use conductor_core::domain::plan::CoordinationStrategy;
    use conductor_core::domain::query::Query;

    #[tokio::test]
    async fn test_default_router_routes() {
        let router = EmbeddedRouter::from_manifest(RouterConfigManifest::default(), false)
            .await
            .unwrap();
        let plan = router.engine().route(&Query::new("fix failing async test")).await.unwrap();
        assert_eq!(plan.strategy, CoordinationStrategy::Direct);
        router.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_outcomes_survive_restart_with_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = RouterConfigManifest::default();
        manifest.spec.learning.backend = StoreBackend::File;
        manifest.spec.learning.path = Some(dir.path().join("patterns.log"));
        let query = Query::new("fix failing async test");

        let router = EmbeddedRouter::from_manifest(manifest.clone(), true).await.unwrap();
        let (_, report) = router
            .dispatcher()
            .route_and_dispatch(&query, &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.success);
        router.shutdown().await.unwrap();

        let reopened = EmbeddedRouter::from_manifest(manifest, false).await.unwrap();
        let pattern = reopened.learning().lookup(&query.signature).await.unwrap();
        assert!(pattern.is_some());
        reopened.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_manifest_is_rejected() {
        let mut manifest = RouterConfigManifest::default();
        manifest.spec.dispatch.max_concurrent_handlers = 0;
        assert!(EmbeddedRouter::from_manifest(manifest, false).await.is_err());
    }
}
