// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for instrumented resource clients.
//!
//! Two families of errors exist:
//!
//! - [`ClientError`] is returned by resource clients. Decorators pass it
//!   through untouched; they only look at whether one is present.
//! - [`ConfigError`] is returned while building decorators, sinks or the
//!   instrumentation factory. It is never produced at call time.

use thiserror::Error;

/// Errors returned by resource client operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} \"{name}\" already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid: {0}")]
    Invalid(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The requested history is gone; a watch must restart from a fresh list.
    #[error("Expired: {0}")]
    Expired(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{}", join_errors(.0))]
    Multiple(Vec<ClientError>),
}

impl ClientError {
    /// Create a not-found error for a resource kind and name.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an already-exists error for a resource kind and name.
    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Check if this error is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error comes from the call context rather than the server.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// The individual errors carried by this value, in order.
    pub fn errors(&self) -> &[ClientError] {
        match self {
            Self::Multiple(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }
}

fn join_errors(errors: &[ClientError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Merge every error source of a single call into one representative error.
///
/// The merge is deterministic: `None` entries are skipped, a single error
/// is returned as is, and several errors become [`ClientError::Multiple`]
/// in input order. Nested `Multiple` values are flattened so the same error
/// never appears at two depths.
///
/// The result is `None` only when every entry is `None`. An empty
/// `Multiple` is still an error and comes back unchanged.
pub fn combine<'a, I>(errors: I) -> Option<ClientError>
where
    I: IntoIterator<Item = Option<&'a ClientError>>,
{
    let mut first: Option<&ClientError> = None;
    let mut merged: Vec<ClientError> = Vec::new();
    for error in errors.into_iter().flatten() {
        first.get_or_insert(error);
        merged.extend(error.errors().iter().cloned());
    }

    match merged.len() {
        0 => first.cloned(),
        1 => merged.pop(),
        _ => Some(ClientError::Multiple(merged)),
    }
}

/// Errors raised while constructing decorators, sinks or the factory.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type for resource client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
