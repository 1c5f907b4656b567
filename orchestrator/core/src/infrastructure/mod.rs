// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod handler_registry;
pub mod pattern_store;
pub mod relationship_store;

pub use event_bus::{DomainEvent, EventBus, EventBusError, EventReceiver, PlanEventReceiver};
pub use handler_registry::{CachedHandlerRegistry, StaticHandlerRegistry};
pub use pattern_store::PatternStore;
pub use relationship_store::InMemoryRelationshipRepository;
