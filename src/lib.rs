// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instrumented clients - logging, metrics and tracing for typed resource clients.
//!
//! Every operation of a typed client (`create`, `get`, `list`, `watch`, ...)
//! can be wrapped by decorators that add one observability concern each,
//! without changing what the caller gets back.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`client`] - The [`ResourceClient`] contract and the [`ClientExt`] builder
//! - [`decorators`] - [`WithTracing`], [`WithMetrics`] and [`WithLogging`]
//! - [`context`] - Per-call [`Context`]: cancellation, deadline and span lineage
//! - [`descriptor`] - Operation and resource labels used by all sinks
//! - [`telemetry`] - Logger, recorder and tracer contracts with `tracing` backed defaults
//! - [`config`] - YAML configuration and the [`Instrumentation`] factory
//! - [`types`] - Resources, option structs, lists and watch events
//! - [`error`] - Error types and result aliases
//! - [`testing`] - In-memory client and recording sinks
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use instrumented_clients::{ClientExt, Context, CreateOptions, DynamicObject};
//! use instrumented_clients::telemetry::{GlobalRecorder, TracingLogger};
//!
//! let client = base
//!     .with_tracing("CoreV1", "ConfigMaps")?
//!     .with_metrics(Arc::new(GlobalRecorder))
//!     .with_logging(Arc::new(TracingLogger::new()));
//!
//! let obj = DynamicObject::new("settings");
//! client.create(&Context::background(), &obj, &CreateOptions::default()).await?;
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod decorators;
pub mod descriptor;
pub mod error;
pub mod telemetry;
pub mod testing;
pub mod types;

// Re-export commonly used types at crate root
pub use client::{BoxedClient, ClientExt, ResourceClient, SharedClient};
pub use config::{InstrumentConfig, Instrumentation, Layer};
pub use context::{CancelHandle, Context, SpanContext, SpanId, TraceId};
pub use decorators::{WithLogging, WithMetrics, WithTracing};
pub use descriptor::{Operation, OperationDescriptor, ResourceDescriptor, DEFAULT_PROTOCOL};
pub use error::{combine, ClientError, ConfigError, Result};
pub use types::{
    // Resources
    DynamicObject, Resource,
    // Options
    CreateOptions, DeleteOptions, GetOptions, ListOptions, PatchOptions, PatchType,
    PropagationPolicy, UpdateOptions,
    // Results
    ObjectList, WatchEvent, WatchStream,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
