// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `conductor-swarm`: Handler Dispatch
//!
//! Executes a [`CoordinationPlan`](conductor_core::domain::plan::CoordinationPlan)
//! produced by the routing engine against the registered handlers.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `DispatchReport`, `HandlerResult`, `DispatchError` |
//! | [`application`] | Application | `PlanDispatcher` |
//!
//! ## Key Concepts
//!
//! - **Concurrency ceiling**: at most `dispatch.max_concurrent_handlers`
//!   invocations run at once across all plans; further invocations queue.
//!   Each handler is additionally capped by its own `max_concurrency`.
//! - **Timeout and retry**: every invocation carries a timeout. A failed or
//!   timed-out slot is retried once with the plan's fallback handler.
//! - **Cancellation**: cancelling the caller's token cancels every in-flight
//!   handler and suppresses outcome recording for the plan.
//! - **Feedback**: a completed dispatch always reports its outcome to the
//!   routing engine, `success = false` when any slot failed.

pub mod domain;
pub mod application;

pub use domain::*;
pub use application::PlanDispatcher;
