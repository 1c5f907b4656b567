// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Handler registry adapters
//!
//! - [`StaticHandlerRegistry`]: catalog declared in configuration, optionally
//!   paired with in-process [`Handler`] implementations
//! - [`CachedHandlerRegistry`]: wraps any registry, refreshing its listing at
//!   most once per interval and serving the last good snapshot when a refresh
//!   fails

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::config::RegistryConfig;
use crate::domain::handler::{Handler, HandlerDescriptor, HandlerId, HandlerRegistry};

pub struct StaticHandlerRegistry {
    descriptors: Vec<HandlerDescriptor>,
    handlers: HashMap<HandlerId, Arc<dyn Handler>>,
}

impl StaticHandlerRegistry {
    pub fn new(descriptors: Vec<HandlerDescriptor>) -> Self {
        Self {
            descriptors,
            handlers: HashMap::new(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.handlers.clone())
    }

    /// Register an invocable handler. Its descriptor replaces any declared
    /// entry with the same id, or is appended when none exists.
    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        let descriptor = handler.descriptor().clone();
        match self.descriptors.iter_mut().find(|d| d.id == descriptor.id) {
            Some(existing) => *existing = descriptor.clone(),
            None => self.descriptors.push(descriptor.clone()),
        }
        self.handlers.insert(descriptor.id, handler);
        self
    }
}

#[async_trait]
impl HandlerRegistry for StaticHandlerRegistry {
    async fn list_handlers(&self) -> Result<Vec<HandlerDescriptor>> {
        Ok(self.descriptors.clone())
    }

    async fn resolve(&self, id: &HandlerId) -> Option<Arc<dyn Handler>> {
        self.handlers.get(id).cloned()
    }
}

struct CachedSnapshot {
    descriptors: Vec<HandlerDescriptor>,
    fetched_at: Instant,
}

pub struct CachedHandlerRegistry {
    upstream: Arc<dyn HandlerRegistry>,
    refresh_interval: Duration,
    snapshot: Mutex<Option<CachedSnapshot>>,
}

impl CachedHandlerRegistry {
    pub fn new(upstream: Arc<dyn HandlerRegistry>, refresh_interval: Duration) -> Self {
        Self {
            upstream,
            refresh_interval,
            snapshot: Mutex::new(None),
        }
    }

    /// Force the next listing to hit the upstream registry
    pub async fn invalidate(&self) {
        *self.snapshot.lock().await = None;
    }
}

#[async_trait]
impl HandlerRegistry for CachedHandlerRegistry {
    async fn list_handlers(&self) -> Result<Vec<HandlerDescriptor>> {
        // Held across the refresh so concurrent callers share one upstream call
        let mut snapshot = self.snapshot.lock().await;

        if let Some(cached) = snapshot.as_ref() {
            if cached.fetched_at.elapsed() < self.refresh_interval {
                return Ok(cached.descriptors.clone());
            }
        }

        match self.upstream.list_handlers().await {
            Ok(descriptors) => {
                debug!(handlers = descriptors.len(), "Refreshed handler registry snapshot");
                *snapshot = Some(CachedSnapshot {
                    descriptors: descriptors.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(descriptors)
            }
            Err(e) => match snapshot.as_ref() {
                Some(stale) => {
                    warn!(
                        error = %e,
                        age_ms = stale.fetched_at.elapsed().as_millis() as u64,
                        "Handler registry refresh failed, serving stale snapshot"
                    );
                    Ok(stale.descriptors.clone())
                }
                None => Err(e),
            },
        }
    }

    async fn resolve(&self, id: &HandlerId) -> Option<Arc<dyn Handler>> {
        self.upstream.resolve(id).await
    }
}
