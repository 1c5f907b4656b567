// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `conductor-cortex`: Pattern Learning & Success Store
//!
//! Remembers which coordination plan worked for which query signature and how
//! well. The routing engine consults it for fast-path lookups and feeds it
//! outcome reports after dispatch.
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `QuerySignature`, `SignatureClass`, `Pattern`, `OutcomeReport`, `LearningEvent` |
//! | [`application`] | Application | `LearningService`, `FeedbackWorker`, `LogCompactor` |
//! | [`infrastructure`] | Infrastructure | `PatternRepository`, in-memory and append-log backends |

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::*;
pub use infrastructure::*;
