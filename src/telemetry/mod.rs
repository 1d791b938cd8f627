// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry sinks used by the client decorators.
//!
//! Each concern has a small contract and a default implementation:
//!
//! - **Logging**: [`Logger`], implemented by [`TracingLogger`]
//! - **Metrics**: [`Recorder`], implemented by [`Metrics`] and [`GlobalRecorder`]
//! - **Tracing**: [`Tracer`] and [`Span`], implemented by [`TracingTracer`]
//!
//! The contracts are what the decorators depend on, so any backend can be
//! plugged in. All sinks are shared between tasks and must be `Send + Sync`.
//!
//! # Usage
//!
//! Install a subscriber once at startup so the `tracing` based sinks print:
//!
//! ```rust,ignore
//! use instrumented_clients::telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! ```

mod attributes;
mod init;
mod logging;
pub mod metrics;
mod spans;

pub use attributes::{find, Attributes, KeyValue, Value};
pub use init::{init_logging, LogConfig, LogFormat};
pub use logging::{Logger, TracingLogger, LOG_TARGET};
pub use metrics::{
    GlobalRecorder, Histogram, Metrics, MetricsSnapshot, OperationMetrics, Recorder,
    GLOBAL_METRICS,
};
pub use spans::{
    start_span, Span, SpanGuard, SpanStatus, Tracer, TracingTracer, CLIENT_GROUP_KEY,
    CLIENT_KIND_KEY, CLIENT_OPERATION_KEY,
};
