// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `conductor-core`: Routing & Coordination Engine
//!
//! Turns a free-form problem description into a [`CoordinationPlan`](domain::plan::CoordinationPlan):
//! which specialist handlers to involve and how to coordinate them.
//!
//! Data flow: query → [`DomainPatternAnalyzer`](application::analyzer::DomainPatternAnalyzer)
//! → [`ConfidenceCalibrator`](application::calibration::ConfidenceCalibrator)
//! → [`RelationshipMapper`](application::relationships::RelationshipMapper) and
//! [`ConflictDetector`](application::conflicts::ConflictDetector)
//! → [`StrategySelector`](application::strategy::StrategySelector)
//! → [`ContextPreservationManager`](application::context_manager::ContextPreservationManager).
//! [`RoutingEngine`](application::engine::RoutingEngine) ties them together with the
//! learning store from `conductor-cortex`.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
