// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the learning store

pub mod repository;
pub mod memory_store;
pub mod file_store;

pub use repository::{CompactionStats, PatternRepository};
pub use memory_store::InMemoryPatternRepository;
pub use file_store::FilePatternRepository;
