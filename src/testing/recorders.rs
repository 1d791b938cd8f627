// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sinks that keep what they receive for later assertions.

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::context::{Context, SpanContext};
use crate::telemetry::{KeyValue, Logger, Recorder, Span, SpanStatus, Tracer};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Tracing
// ============================================================================

/// A span as seen by [`RecordingTracer`].
#[derive(Debug, Clone)]
pub struct RecordedSpan {
    pub name: String,
    pub context: SpanContext,
    pub attributes: Vec<KeyValue>,
    pub status: SpanStatus,
    pub started: Instant,
    /// Time of the first `end` call.
    pub ended: Option<Instant>,
    /// Number of `end` calls, including ignored ones.
    pub end_calls: usize,
}

impl RecordedSpan {
    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }
}

/// Tracer that records every span it starts.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans in start order.
    pub fn spans(&self) -> Vec<RecordedSpan> {
        lock(&self.spans).clone()
    }

    /// Spans started but not yet ended.
    pub fn open_spans(&self) -> usize {
        lock(&self.spans).iter().filter(|s| !s.is_ended()).count()
    }
}

impl Tracer for RecordingTracer {
    fn start_span(
        &self,
        ctx: &Context,
        name: &str,
        attributes: Vec<KeyValue>,
    ) -> (Context, Box<dyn Span>) {
        let context = SpanContext::child_of(ctx.span_context());
        let index = {
            let mut spans = lock(&self.spans);
            spans.push(RecordedSpan {
                name: name.to_string(),
                context,
                attributes,
                status: SpanStatus::Unset,
                started: Instant::now(),
                ended: None,
                end_calls: 0,
            });
            spans.len() - 1
        };
        let span = RecordingSpan {
            spans: Arc::clone(&self.spans),
            index,
            context,
        };
        (ctx.with_span(context), Box::new(span))
    }
}

struct RecordingSpan {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
    index: usize,
    context: SpanContext,
}

impl RecordingSpan {
    fn update(&self, f: impl FnOnce(&mut RecordedSpan)) {
        if let Some(span) = lock(&self.spans).get_mut(self.index) {
            f(span);
        }
    }
}

impl Span for RecordingSpan {
    fn span_context(&self) -> &SpanContext {
        &self.context
    }

    fn set_attribute(&mut self, attribute: KeyValue) {
        self.update(|span| {
            if !span.is_ended() {
                span.attributes.push(attribute);
            }
        });
    }

    fn set_status(&mut self, status: SpanStatus) {
        self.update(|span| {
            if !span.is_ended() {
                span.status = status;
            }
        });
    }

    fn end(&mut self) {
        self.update(|span| {
            span.end_calls += 1;
            span.ended.get_or_insert_with(Instant::now);
        });
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

/// A log entry as seen by [`RecordingLogger`].
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub attributes: Vec<KeyValue>,
    /// Rendered error, for error entries.
    pub error: Option<String>,
}

/// Logger that keeps every entry.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).clone()
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str, attributes: &[KeyValue]) {
        lock(&self.entries).push(LogEntry {
            level: LogLevel::Info,
            message: message.to_string(),
            attributes: attributes.to_vec(),
            error: None,
        });
    }

    fn error(&self, error: &dyn Error, message: &str, attributes: &[KeyValue]) {
        lock(&self.entries).push(LogEntry {
            level: LogLevel::Error,
            message: message.to_string(),
            attributes: attributes.to_vec(),
            error: Some(error.to_string()),
        });
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Recorder that keeps every observation.
#[derive(Debug, Default)]
pub struct CountingRecorder {
    observations: Mutex<Vec<(String, Duration)>>,
}

impl CountingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observations in arrival order.
    pub fn observations(&self) -> Vec<(String, Duration)> {
        lock(&self.observations).clone()
    }

    /// Observations recorded under `operation`.
    pub fn count(&self, operation: &str) -> usize {
        lock(&self.observations)
            .iter()
            .filter(|(label, _)| label == operation)
            .count()
    }

    pub fn total(&self) -> usize {
        lock(&self.observations).len()
    }
}

impl Recorder for CountingRecorder {
    fn record(&self, operation: &str, elapsed: Duration) {
        lock(&self.observations).push((operation.to_string(), elapsed));
    }
}
