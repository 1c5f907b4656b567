// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dispatch Domain Layer
//!
//! Pure result and error types for plan dispatch. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`dispatch`] | `DispatchReport`, `HandlerResult`, `InvocationStatus`, `DispatchError` |

pub mod dispatch;

pub use dispatch::*;
