// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the learning store's application services.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Outcome recording, lookups, feedback consumption and log compaction

pub mod learning_service;
pub mod feedback;
pub mod log_compactor;

pub use learning_service::*;
pub use feedback::*;
pub use log_compactor::*;
