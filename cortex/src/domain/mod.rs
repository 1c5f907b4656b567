// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer of the learning store: signatures, patterns, outcomes and events.
//! No I/O dependencies.

pub mod signature;
pub mod pattern;
pub mod outcome;
pub mod events;
pub mod error;

pub use signature::*;
pub use pattern::*;
pub use outcome::*;
pub use events::*;
pub use error::*;
