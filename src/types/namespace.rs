// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{CONDITION_TYPE, FINALIZER};
use crate::error::{OperatorError, Result};
use crate::types::resource::DesiredResource;
use k8s_openapi::api::core::v1::Namespace;
use std::collections::BTreeMap;

/// Kind of lifecycle event delivered for a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}

/// A lifecycle notification for a single namespace
#[derive(Debug, Clone)]
pub struct NamespaceEvent {
    pub name: String,
    pub kind: EventKind,
    pub object: Option<Namespace>,
}

impl NamespaceEvent {
    pub fn new(kind: EventKind, namespace: Namespace) -> Option<Self> {
        let name = namespace.metadata.name.clone()?;
        Some(NamespaceEvent {
            name,
            kind,
            object: Some(namespace),
        })
    }
}

/// Observed state of a namespace, rebuilt from the API object on every pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceRecord {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub resource_version: Option<String>,
    pub finalizers: Vec<String>,
    pub deletion_requested: bool,
    /// Current status of the operator's condition, if set
    pub condition_status: Option<String>,
}

impl NamespaceRecord {
    pub fn from_namespace(namespace: &Namespace) -> Result<Self> {
        let meta = &namespace.metadata;
        let name = meta
            .name
            .clone()
            .ok_or_else(|| OperatorError::MissingField("namespace metadata.name".to_string()))?;

        let condition_status = namespace
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .and_then(|conditions| conditions.iter().find(|c| c.type_ == CONDITION_TYPE))
            .map(|c| c.status.clone());

        Ok(NamespaceRecord {
            name,
            labels: meta.labels.clone().unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
            resource_version: meta.resource_version.clone(),
            finalizers: meta.finalizers.clone().unwrap_or_default(),
            deletion_requested: meta.deletion_timestamp.is_some(),
            condition_status,
        })
    }

    pub fn has_finalizer(&self) -> bool {
        self.finalizers.iter().any(|f| f == FINALIZER)
    }

    /// Whether the operator's condition currently reports a failure
    pub fn has_failure_condition(&self) -> bool {
        self.condition_status.as_deref() == Some("False")
    }
}

/// Child resources that must exist for a namespace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    pub resources: Vec<DesiredResource>,
}

impl DesiredState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: DesiredResource) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
