// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the conductor CLI

pub mod config;
pub mod patterns;
pub mod route;

pub use self::config::ConfigCommand;
pub use self::patterns::PatternsCommand;
pub use self::route::RouteArgs;
