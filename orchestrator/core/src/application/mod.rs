// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod analyzer;
pub mod calibration;
pub mod relationships;
pub mod conflicts;
pub mod strategy;
pub mod context_manager;
pub mod engine;

// Re-export services for convenience
pub use analyzer::DomainPatternAnalyzer;
pub use calibration::ConfidenceCalibrator;
pub use conflicts::ConflictDetector;
pub use context_manager::{ContextPreservationManager, HandoffContext};
pub use engine::{OutcomeDisposition, RoutingEngine};
pub use relationships::{PathSearch, RelationshipAnalysis, RelationshipMapper};
pub use strategy::{DomainCandidate, StrategyDecision, StrategySelector};
