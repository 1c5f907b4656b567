// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming over tokio broadcast channels. Routing decisions,
// outcome feedback and learning-store changes are all published here for the
// CLI and other observers. Events are not persisted.

use anyhow::Result;
use async_trait::async_trait;
use conductor_cortex::{EventBus as LearningEventSink, LearningEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::RoutingEvent;
use crate::domain::plan::PlanId;

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Routing(RoutingEvent),
    Learning(LearningEvent),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Routing(event) => event.event_type(),
            DomainEvent::Learning(event) => event.event_type(),
        }
    }
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Capacity is how many events are buffered before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_routing_event(&self, event: RoutingEvent) {
        self.broadcast(DomainEvent::Routing(event));
    }

    pub fn publish_learning_event(&self, event: LearningEvent) {
        self.broadcast(DomainEvent::Learning(event));
    }

    fn broadcast(&self, event: DomainEvent) {
        debug!(event_type = event.event_type(), "Publishing event");

        // send() only fails when nobody is subscribed
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to routing events for one plan only
    pub fn subscribe_plan(&self, plan_id: PlanId) -> PlanEventReceiver {
        PlanEventReceiver {
            receiver: self.sender.subscribe(),
            plan_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Lets the learning service publish onto the same bus
#[async_trait]
impl LearningEventSink for EventBus {
    async fn publish(&self, event: LearningEvent) -> Result<()> {
        self.publish_learning_event(event);
        Ok(())
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to the routing events of a single plan
pub struct PlanEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    plan_id: PlanId,
}

impl PlanEventReceiver {
    pub async fn recv(&mut self) -> Result<RoutingEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let DomainEvent::Routing(routing) = event {
                if self.matches_plan(&routing) {
                    return Ok(routing);
                }
            }
        }
    }

    fn matches_plan(&self, event: &RoutingEvent) -> bool {
        match event {
            RoutingEvent::PlanSelected { plan_id, .. }
            | RoutingEvent::OutcomeReported { plan_id, .. }
            | RoutingEvent::OutcomeCoalesced { plan_id, .. } => plan_id == &self.plan_id,
            RoutingEvent::DegradedMode { plan_id, .. } => plan_id.as_ref() == Some(&self.plan_id),
            RoutingEvent::NoMatchingDomain { .. }
            | RoutingEvent::RelationshipReinforced { .. }
            | RoutingEvent::CalibrationHealthChanged { .. }
            | RoutingEvent::ContextTransferDegraded { .. } => false,
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
