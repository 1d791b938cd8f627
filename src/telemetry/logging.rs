// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Structured logger contract and its `tracing` implementation.

use std::error::Error;

use super::attributes::{Attributes, KeyValue};

/// Target of every event emitted by [`TracingLogger`].
pub const LOG_TARGET: &str = "instrumented_clients";

/// Leveled structured logging.
///
/// Implementations must be safe to call from many tasks at once and must not
/// block on I/O; a failure to write is the logger's own business.
pub trait Logger: Send + Sync {
    /// Log a successful event.
    fn info(&self, message: &str, attributes: &[KeyValue]);

    /// Log a failure together with its error.
    fn error(&self, error: &dyn Error, message: &str, attributes: &[KeyValue]);
}

/// Logger that emits `tracing` events.
///
/// Fixed values given at construction are prepended to every entry.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    name: Option<String>,
    values: Vec<KeyValue>,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a name segment; segments are joined with `.`.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(match self.name.take() {
            Some(parent) => format!("{}.{}", parent, name),
            None => name.to_string(),
        });
        self
    }

    /// Add values included in every entry.
    pub fn with_values(mut self, values: impl IntoIterator<Item = KeyValue>) -> Self {
        self.values.extend(values);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn merged(&self, attributes: &[KeyValue]) -> Vec<KeyValue> {
        self.values.iter().chain(attributes).cloned().collect()
    }
}

impl Logger for TracingLogger {
    fn info(&self, message: &str, attributes: &[KeyValue]) {
        let attributes = self.merged(attributes);
        tracing::info!(
            target: LOG_TARGET,
            logger = self.name().unwrap_or_default(),
            attributes = %Attributes(&attributes),
            "{}",
            message
        );
    }

    fn error(&self, error: &dyn Error, message: &str, attributes: &[KeyValue]) {
        let attributes = self.merged(attributes);
        tracing::error!(
            target: LOG_TARGET,
            logger = self.name().unwrap_or_default(),
            error = %error,
            attributes = %Attributes(&attributes),
            "{}",
            message
        );
    }
}
