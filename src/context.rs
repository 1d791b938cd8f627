// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Execution context threaded through every client call.
//!
//! A [`Context`] carries three things down a call chain:
//!
//! - a cancellation signal, created with [`Context::with_cancel`]
//! - an optional deadline, created with [`Context::with_deadline`] or
//!   [`Context::with_timeout`]
//! - the trace lineage: the [`SpanContext`] of the innermost open span
//!
//! A context never owns a `tracing` span, so a context kept past the call
//! (a watch task keeps one for the stream's lifetime) holds no span open.
//!
//! Contexts are values. Every `with_*` method returns a new context and
//! leaves the receiver untouched, so a decorator that opens a span hands a
//! fresh context to the inner client while its caller keeps the original.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::ClientError;

/// Identifier shared by every span of one trace.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().as_u128())
    }

    /// Create a trace ID from its raw value.
    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// Get a short representation (first 8 hex characters).
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self.short())
    }
}

/// Identifier of a single span within a trace.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Generate a new random span ID.
    pub fn new() -> Self {
        Self((Uuid::new_v4().as_u128() >> 64) as u64)
    }

    /// Create a span ID from its raw value.
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({})", self)
    }
}

/// Position of a span in its trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanContext {
    /// Trace this span belongs to.
    pub trace_id: TraceId,
    /// This span.
    pub span_id: SpanId,
    /// The span this one was started under, if any.
    pub parent_span_id: Option<SpanId>,
}

impl SpanContext {
    /// Start a new trace.
    pub fn root() -> Self {
        Self {
            trace_id: TraceId::new(),
            span_id: SpanId::new(),
            parent_span_id: None,
        }
    }

    /// A new span in the same trace, parented to this one.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::new(),
            parent_span_id: Some(self.span_id),
        }
    }

    /// A child of `parent` when there is one, otherwise a new root.
    pub fn child_of(parent: Option<&SpanContext>) -> Self {
        parent.map_or_else(Self::root, Self::child)
    }

    /// Check whether this span starts its trace.
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

/// Shared cancellation state. Children are cancelled with their parent.
#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<CancelState>>>,
}

impl CancelState {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();

        let children = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn child(&self) -> Arc<CancelState> {
        let child = Arc::new(CancelState::default());
        // Checked under the lock so a concurrent cancel cannot miss the child.
        let mut children = self
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            child.cancelled.store(true, Ordering::SeqCst);
        } else {
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        child
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle that cancels the context it was created with.
///
/// Cancelling also cancels every context derived from that one.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    /// Cancel the associated context.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Check whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Per-call execution context.
#[derive(Clone)]
pub struct Context {
    cancel: Option<Arc<CancelState>>,
    deadline: Option<Instant>,
    span: Option<SpanContext>,
}

impl Context {
    /// An empty context: never cancelled, no deadline, no span.
    pub fn background() -> Self {
        Self {
            cancel: None,
            deadline: None,
            span: None,
        }
    }

    /// Derive a cancellable context.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let state = match &self.cancel {
            Some(parent) => parent.child(),
            None => Arc::new(CancelState::default()),
        };
        let ctx = Self {
            cancel: Some(Arc::clone(&state)),
            ..self.clone()
        };
        (ctx, CancelHandle { state })
    }

    /// Derive a context that expires at `deadline`.
    ///
    /// An earlier deadline already present is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Context {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// Derive a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context whose innermost span is `span`.
    pub fn with_span(&self, span: SpanContext) -> Context {
        Self {
            span: Some(span),
            ..self.clone()
        }
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. Zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Check whether the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    /// Check whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// The reason this context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ClientError> {
        if self.is_cancelled() {
            Some(ClientError::Cancelled)
        } else if self.is_expired() {
            Some(ClientError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    ///
    /// Never resolves for a context with neither.
    pub async fn done(&self) -> ClientError {
        let cancelled = async {
            match &self.cancel {
                Some(state) => state.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => ClientError::Cancelled,
            _ = expired => ClientError::DeadlineExceeded,
        }
    }

    /// The innermost open span, if any.
    pub fn span_context(&self) -> Option<&SpanContext> {
        self.span.as_ref()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("span", &self.span)
            .finish()
    }
}
