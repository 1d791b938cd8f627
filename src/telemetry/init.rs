// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Subscriber setup for the `tracing` based sinks.
//!
//! Libraries normally leave subscriber installation to the application.
//! [`init_logging`] is the one-call setup for binaries, tests and benches
//! that want [`TracingLogger`](super::TracingLogger) entries and
//! [`TracingTracer`](super::TracingTracer) spans printed.

use std::io;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output layout of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
}

/// Configuration for [`init_logging`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level if RUST_LOG is not set.
    #[serde(with = "level_serde")]
    pub default_level: Level,

    /// Custom filter directive (overrides RUST_LOG and default_level).
    pub filter_directive: Option<String>,

    /// Whether closed client spans are printed with their timings.
    pub include_span_close: bool,

    /// Whether to include file/line information.
    pub include_file_line: bool,

    /// Whether to include the event target.
    pub include_target: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            filter_directive: None,
            include_span_close: false,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            format: LogFormat::Compact,
        }
    }
}

impl LogConfig {
    /// Verbose output including span closings.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_close: true,
            include_file_line: true,
            format: LogFormat::Full,
            ..Self::default()
        }
    }

    /// Failures only, no colors.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_target: false,
            ansi_colors: false,
            ..Self::default()
        }
    }

    /// Everything from this crate, plain text for captured test output.
    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            filter_directive: Some("instrumented_clients=trace".to_string()),
            include_span_close: true,
            ansi_colors: false,
            format: LogFormat::Full,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Install a global `tracing` subscriber built from `config`.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> io::Result<()> {
    let span_events = if config.include_span_close {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(config.env_filter());
    let installed = match config.format {
        LogFormat::Compact => registry.with(fmt_layer.compact()).try_init(),
        LogFormat::Full => registry.with(fmt_layer).try_init(),
    };
    installed.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

mod level_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
