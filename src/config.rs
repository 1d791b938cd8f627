// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instrumentation configuration and the client factory.
//!
//! [`InstrumentConfig`] says which decorators wrap a client and in what
//! order. [`Instrumentation`] pairs it with the sinks and builds wrapped
//! clients:
//!
//! ```yaml
//! enabled: true
//! protocol: KUBE
//! layers: [tracing, metrics, logging]   # innermost first
//! log:
//!   default_level: debug
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{ResourceClient, SharedClient};
use crate::decorators::{WithLogging, WithMetrics, WithTracing};
use crate::descriptor::{validate_label, ResourceDescriptor, DEFAULT_PROTOCOL};
use crate::error::ConfigError;
use crate::telemetry::{
    GlobalRecorder, LogConfig, Logger, Recorder, Tracer, TracingLogger, TracingTracer,
};
use crate::types::Resource;

/// One decorator in a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Tracing,
    Metrics,
    Logging,
}

impl Layer {
    /// The default stack, innermost first.
    pub const DEFAULT_STACK: [Layer; 3] = [Layer::Tracing, Layer::Metrics, Layer::Logging];
}

/// Which decorators to apply, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// When false, clients are returned unwrapped.
    pub enabled: bool,

    /// Span name prefix.
    pub protocol: String,

    /// Decorators to apply, innermost first. Repeats are allowed.
    pub layers: Vec<Layer>,

    /// Subscriber settings for the `tracing` based sinks.
    pub log: LogConfig,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            protocol: DEFAULT_PROTOCOL.to_string(),
            layers: Layer::DEFAULT_STACK.to_vec(),
            log: LogConfig::default(),
        }
    }
}

impl InstrumentConfig {
    /// A config that applies no decorators.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file (YAML, or JSON by extension).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let config: Self = match extension.as_str() {
            "json" => serde_json::from_str(&content)
                .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?,
            _ => serde_yaml::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject a protocol that cannot prefix a span name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_label("protocol", &self.protocol)
    }
}

/// Builds instrumented clients from a config and a set of sinks.
///
/// Cheap to clone; the sinks are shared.
#[derive(Clone)]
pub struct Instrumentation {
    config: InstrumentConfig,
    logger: Arc<dyn Logger>,
    recorder: Arc<dyn Recorder>,
    tracer: Arc<dyn Tracer>,
}

impl Instrumentation {
    /// Use the default sinks: `tracing` events and spans, and the
    /// process-wide metrics.
    pub fn new(config: InstrumentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            logger: Arc::new(TracingLogger::new().with_name("client")),
            recorder: Arc::new(GlobalRecorder),
            tracer: Arc::new(TracingTracer),
        })
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// Wrap `inner` in the configured layers.
    ///
    /// The span protocol comes from the config; group and kind from
    /// `resource`.
    pub fn instrument<K, C>(
        &self,
        inner: C,
        resource: &ResourceDescriptor,
    ) -> Result<SharedClient<K>, ConfigError>
    where
        K: Resource,
        C: ResourceClient<K> + 'static,
    {
        let mut client: SharedClient<K> = Arc::new(inner);
        if !self.config.enabled {
            return Ok(client);
        }

        let resource = ResourceDescriptor::with_protocol(
            &self.config.protocol,
            resource.group(),
            resource.kind(),
        )?;
        for layer in &self.config.layers {
            client = match layer {
                Layer::Tracing => Arc::new(WithTracing::from_descriptor(
                    client,
                    resource.clone(),
                    Arc::clone(&self.tracer),
                )),
                Layer::Metrics => Arc::new(WithMetrics::new(client, Arc::clone(&self.recorder))),
                Layer::Logging => Arc::new(WithLogging::new(client, Arc::clone(&self.logger))),
            };
        }
        Ok(client)
    }
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
