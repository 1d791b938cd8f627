// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Test doubles for clients and telemetry sinks.
//!
//! [`InMemoryClient`] stands in for a real transport. The recording sinks
//! capture every span, log entry and metric observation so tests can assert
//! on exactly what the decorators emitted.

mod memory;
mod recorders;

pub use memory::{CallRecord, InMemoryClient};
pub use recorders::{
    CountingRecorder, LogEntry, LogLevel, RecordedSpan, RecordingLogger, RecordingTracer,
};
