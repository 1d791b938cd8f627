// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Static labels shared by every instrumentation concern.
//!
//! A [`ResourceDescriptor`] is built once per client type and validated at
//! construction. Each client method pairs it with a fixed [`Operation`], so
//! telemetry for one operation can never carry another operation's name.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Protocol prefix used when none is configured.
pub const DEFAULT_PROTOCOL: &str = "KUBE";

/// The operations of a typed resource client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    UpdateStatus,
    Delete,
    DeleteCollection,
    Get,
    List,
    Watch,
    Patch,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 9] = [
        Self::Create,
        Self::Update,
        Self::UpdateStatus,
        Self::Delete,
        Self::DeleteCollection,
        Self::Get,
        Self::List,
        Self::Watch,
        Self::Patch,
    ];

    /// Method name, used in span names and log messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::UpdateStatus => "UpdateStatus",
            Self::Delete => "Delete",
            Self::DeleteCollection => "DeleteCollection",
            Self::Get => "Get",
            Self::List => "List",
            Self::Watch => "Watch",
            Self::Patch => "Patch",
        }
    }

    /// Lowercase label used for metric observations.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::UpdateStatus => "update_status",
            Self::Delete => "delete",
            Self::DeleteCollection => "delete_collection",
            Self::Get => "get",
            Self::List => "list",
            Self::Watch => "watch",
            Self::Patch => "patch",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one resource client: protocol, client group and resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    protocol: String,
    group: String,
    kind: String,
}

impl ResourceDescriptor {
    /// Create a descriptor using the default protocol.
    ///
    /// Group and kind must be non-empty and must not contain `/` or
    /// whitespace, since they are joined into span names.
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_protocol(DEFAULT_PROTOCOL, group, kind)
    }

    /// Create a descriptor with an explicit protocol prefix.
    pub fn with_protocol(
        protocol: impl Into<String>,
        group: impl Into<String>,
        kind: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let descriptor = Self {
            protocol: protocol.into(),
            group: group.into(),
            kind: kind.into(),
        };
        validate_label("protocol", &descriptor.protocol)?;
        validate_label("group", &descriptor.group)?;
        validate_label("kind", &descriptor.kind)?;
        Ok(descriptor)
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Pair this resource with one of its operations.
    pub fn operation(&self, operation: Operation) -> OperationDescriptor<'_> {
        OperationDescriptor {
            resource: self,
            operation,
        }
    }
}

/// Check that `value` can be joined into a span name.
pub(crate) fn validate_label(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    if value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(ConfigError::invalid(
            field,
            format!("\"{}\" must not contain '/' or whitespace", value),
        ));
    }
    Ok(())
}

/// A resource descriptor paired with one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationDescriptor<'a> {
    pub resource: &'a ResourceDescriptor,
    pub operation: Operation,
}

impl OperationDescriptor<'_> {
    /// Span name: `"<PROTOCOL> <group>/<kind>/<Operation>"`.
    pub fn span_name(&self) -> String {
        format!(
            "{} {}/{}/{}",
            self.resource.protocol, self.resource.group, self.resource.kind, self.operation
        )
    }
}
