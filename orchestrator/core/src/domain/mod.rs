// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Routing domain model: queries, handlers, scores, confidence, relationships,
//! conflicts, plans, context bundles and configuration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and invariants, no I/O

pub mod query;
pub mod handler;
pub mod score;
pub mod confidence;
pub mod calibration;
pub mod relationship;
pub mod conflict;
pub mod plan;
pub mod context;
pub mod events;
pub mod errors;
pub mod config;
pub mod repository;
