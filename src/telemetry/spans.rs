// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span tracer contract and its `tracing` implementation.
//!
//! A [`Tracer`] derives a child span from a [`Context`] and returns a new
//! context that references it. The caller owns the returned [`Span`] and
//! must end it exactly once; [`SpanGuard`] does that on every exit path.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use tracing::field;
use tracing::instrument::{Instrument, Instrumented};

use super::attributes::{KeyValue, Value};
use super::logging::LOG_TARGET;
use crate::context::{Context, SpanContext};

/// Attribute key for the client group of a span.
pub const CLIENT_GROUP_KEY: &str = "kube.client.group";

/// Attribute key for the resource kind of a span.
pub const CLIENT_KIND_KEY: &str = "kube.client.kind";

/// Attribute key for the operation of a span.
pub const CLIENT_OPERATION_KEY: &str = "kube.client.operation";

/// Terminal status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error {
        description: String,
    },
}

impl SpanStatus {
    pub fn error(description: impl Into<String>) -> Self {
        Self::Error {
            description: description.into(),
        }
    }

    /// `Ok` for a success, `Error` carrying the error text otherwise.
    pub fn from_result<T, E: Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(err) => Self::error(err.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// A single open span.
pub trait Span: Send {
    /// Position of this span in its trace.
    fn span_context(&self) -> &SpanContext;

    fn set_attribute(&mut self, attribute: KeyValue);

    /// Set the terminal status. The last call wins.
    fn set_status(&mut self, status: SpanStatus);

    /// Close the span. Calls after the first are ignored.
    fn end(&mut self);

    /// The `tracing` span to enter while work runs under this span.
    ///
    /// The returned handle keeps the span open, so it must not outlive the
    /// call that opened it.
    fn scope(&self) -> tracing::Span {
        tracing::Span::none()
    }
}

/// Creates spans.
pub trait Tracer: Send + Sync {
    /// Start a child of the span referenced by `ctx`.
    ///
    /// Returns the new span and a context that references it; `ctx` itself
    /// is left as it was.
    fn start_span(
        &self,
        ctx: &Context,
        name: &str,
        attributes: Vec<KeyValue>,
    ) -> (Context, Box<dyn Span>);
}

/// Ends its span exactly once.
///
/// [`finish`](Self::finish) sets the status from the call outcome. If the
/// guard is dropped first (the call panicked or its future was dropped) the
/// span still ends, with an error status.
pub struct SpanGuard {
    span: Option<Box<dyn Span>>,
}

impl SpanGuard {
    pub fn new(span: Box<dyn Span>) -> Self {
        Self { span: Some(span) }
    }

    pub fn span_context(&self) -> Option<&SpanContext> {
        self.span.as_ref().map(|s| s.span_context())
    }

    /// Run `future` inside the span's `tracing` scope.
    ///
    /// Spans opened while `future` is polled nest under this one. The scope
    /// handle is released when the returned future is dropped.
    pub fn scoped<F: Future>(&self, future: F) -> Instrumented<F> {
        let scope = self
            .span
            .as_ref()
            .map_or_else(tracing::Span::none, |s| s.scope());
        future.instrument(scope)
    }

    /// Record the outcome and end the span.
    pub fn finish<T, E: Display>(mut self, result: &Result<T, E>) {
        if let Some(mut span) = self.span.take() {
            span.set_status(SpanStatus::from_result(result));
            span.end();
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(mut span) = self.span.take() {
            let description = if std::thread::panicking() {
                "panicked"
            } else {
                "cancelled"
            };
            span.set_status(SpanStatus::error(description));
            span.end();
        }
    }
}

/// Start a span and wrap it in a [`SpanGuard`].
pub fn start_span(
    tracer: &dyn Tracer,
    ctx: &Context,
    name: &str,
    attributes: Vec<KeyValue>,
) -> (Context, SpanGuard) {
    let (ctx, span) = tracer.start_span(ctx, name, attributes);
    (ctx, SpanGuard::new(span))
}

/// Tracer backed by `tracing` spans.
///
/// Spans take the current `tracing` span as parent. Work run through
/// [`SpanGuard::scoped`] enters its span, so a subscriber such as an
/// OpenTelemetry layer sees the same parent/child structure as the
/// [`SpanContext`] lineage. The returned context holds no `tracing` handle,
/// so the span closes on [`Span::end`] however long the context lives.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn start_span(
        &self,
        ctx: &Context,
        name: &str,
        attributes: Vec<KeyValue>,
    ) -> (Context, Box<dyn Span>) {
        let span_context = SpanContext::child_of(ctx.span_context());
        let span = tracing::info_span!(
            target: LOG_TARGET,
            "client",
            otel.name = name,
            otel.kind = "client",
            trace_id = %span_context.trace_id,
            span_id = %span_context.span_id,
            kube.client.group = field::Empty,
            kube.client.kind = field::Empty,
            kube.client.operation = field::Empty,
            otel.status_code = field::Empty,
            otel.status_description = field::Empty,
            elapsed_ms = field::Empty,
        );
        for attribute in &attributes {
            record_value(&span, attribute.key, &attribute.value);
        }

        let child = ctx.with_span(span_context);
        let span = TracingSpan {
            span,
            context: span_context,
            start: Instant::now(),
            ended: false,
        };
        (child, Box::new(span))
    }
}

/// Keys not declared on the span are silently dropped by `tracing`.
fn record_value(span: &tracing::Span, key: &str, value: &Value) {
    match value {
        Value::Str(v) => span.record(key, v.as_str()),
        Value::I64(v) => span.record(key, *v),
        Value::F64(v) => span.record(key, *v),
        Value::Bool(v) => span.record(key, *v),
        Value::Duration(v) => span.record(key, field::debug(v)),
    };
}

struct TracingSpan {
    span: tracing::Span,
    context: SpanContext,
    start: Instant,
    ended: bool,
}

impl Span for TracingSpan {
    fn span_context(&self) -> &SpanContext {
        &self.context
    }

    fn set_attribute(&mut self, attribute: KeyValue) {
        if !self.ended {
            record_value(&self.span, attribute.key, &attribute.value);
        }
    }

    fn set_status(&mut self, status: SpanStatus) {
        if self.ended {
            return;
        }
        match status {
            SpanStatus::Unset => {}
            SpanStatus::Ok => {
                self.span.record("otel.status_code", "OK");
            }
            SpanStatus::Error { description } => {
                self.span.record("otel.status_code", "ERROR");
                self.span
                    .record("otel.status_description", description.as_str());
            }
        }
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.span
            .record("elapsed_ms", self.start.elapsed().as_secs_f64() * 1000.0);
        self.span = tracing::Span::none();
    }

    fn scope(&self) -> tracing::Span {
        self.span.clone()
    }
}
