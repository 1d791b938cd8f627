// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instrumentation decorators for [`ResourceClient`](crate::ResourceClient).
//!
//! Each decorator implements the full client contract, forwards every call
//! to the client it wraps, and adds exactly one concern around it:
//!
//! - [`WithTracing`] - a child span per call
//! - [`WithMetrics`] - one recorder observation per call
//! - [`WithLogging`] - one log entry per completed call
//!
//! Outcomes are returned verbatim. Decorators never retry, suppress or
//! translate errors, and they hold no per-call state outside the call, so a
//! single stack can be shared by every task in the process.
//!
//! # Data Flow
//!
//! ```text
//! caller
//!   → WithLogging   (note start time)
//!   → WithMetrics   (note start time)
//!   → WithTracing   (open span, derive context)
//!   → base client
//!   ← WithTracing   (set status, end span)
//!   ← WithMetrics   (record observation)
//!   ← WithLogging   (log outcome)
//! caller receives the base client's outcome
//! ```

mod logging;
mod metrics;
mod tracing;

pub use self::logging::WithLogging;
pub use self::metrics::WithMetrics;
pub use self::tracing::WithTracing;
