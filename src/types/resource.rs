// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Child resource kinds and references.

use crate::constants::{annotations, labels};
use crate::error::{OperatorError, Result};
use k8s_openapi::api::core::v1::{ConfigMap, LimitRange, ResourceQuota};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::api::{ApiResource, DynamicObject, ObjectMeta};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Namespace-scoped resource kinds the operator manages.
///
/// Variant order is the dependency order: creates and updates run top to
/// bottom, deletes bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    ResourceQuota,
    LimitRange,
    ConfigMap,
    RoleBinding,
    NetworkPolicy,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::ResourceQuota,
        ResourceKind::LimitRange,
        ResourceKind::ConfigMap,
        ResourceKind::RoleBinding,
        ResourceKind::NetworkPolicy,
    ];

    pub fn api_resource(&self) -> ApiResource {
        match self {
            ResourceKind::ResourceQuota => ApiResource::erase::<ResourceQuota>(&()),
            ResourceKind::LimitRange => ApiResource::erase::<LimitRange>(&()),
            ResourceKind::ConfigMap => ApiResource::erase::<ConfigMap>(&()),
            ResourceKind::RoleBinding => ApiResource::erase::<RoleBinding>(&()),
            ResourceKind::NetworkPolicy => ApiResource::erase::<NetworkPolicy>(&()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ResourceQuota => "ResourceQuota",
            ResourceKind::LimitRange => "LimitRange",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::NetworkPolicy => "NetworkPolicy",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a child resource, without its content hash
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A resource the operator is responsible for.
///
/// Two refs with the same key and a different `spec_hash` mean an update is
/// required. An observed resource without a hash annotation never matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
    pub spec_hash: Option<String>,
}

impl ChildResourceRef {
    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            kind: self.kind,
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for ChildResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A child resource as it should exist, with its full body
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredResource {
    pub reference: ChildResourceRef,
    /// Top-level fields other than apiVersion, kind and metadata
    pub body: Value,
}

impl DesiredResource {
    /// Build a desired resource, hashing its body.
    ///
    /// `body` may be a full typed object serialized to JSON; type and
    /// metadata fields are stripped before hashing.
    pub fn new(kind: ResourceKind, namespace: &str, name: &str, body: Value) -> Result<Self> {
        let Value::Object(mut fields) = body else {
            return Err(OperatorError::InvalidPolicy {
                namespace: namespace.to_string(),
                message: format!("{} {} body must be a JSON object", kind, name),
            });
        };
        fields.remove("apiVersion");
        fields.remove("kind");
        fields.remove("metadata");
        let body = Value::Object(fields);

        Ok(DesiredResource {
            reference: ChildResourceRef {
                kind,
                name: name.to_string(),
                namespace: namespace.to_string(),
                spec_hash: Some(spec_hash(&body)?),
            },
            body,
        })
    }

    pub fn key(&self) -> ResourceKey {
        self.reference.key()
    }

    /// Render the object sent to the API server
    pub fn to_dynamic_object(&self) -> DynamicObject {
        let ar = self.reference.kind.api_resource();
        let mut obj = DynamicObject::new(&self.reference.name, &ar)
            .within(&self.reference.namespace)
            .data(self.body.clone());
        obj.metadata.labels = Some(BTreeMap::from([(
            labels::MANAGED_BY.to_string(),
            labels::MANAGED_BY_VALUE.to_string(),
        )]));
        if let Some(hash) = &self.reference.spec_hash {
            obj.metadata.annotations = Some(BTreeMap::from([(
                annotations::SPEC_HASH.to_string(),
                hash.clone(),
            )]));
        }
        obj
    }
}

/// A child resource as read from the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResource {
    pub reference: ChildResourceRef,
    pub resource_version: Option<String>,
    /// Carries the operator ownership label
    pub owned: bool,
}

impl ObservedResource {
    pub fn from_dynamic(kind: ResourceKind, obj: &DynamicObject) -> Result<Self> {
        Self::from_metadata(kind, &obj.metadata)
    }

    pub fn from_metadata(kind: ResourceKind, metadata: &ObjectMeta) -> Result<Self> {
        let name = metadata
            .name
            .clone()
            .ok_or_else(|| OperatorError::MissingField(format!("{} metadata.name", kind)))?;
        let namespace = metadata
            .namespace
            .clone()
            .ok_or_else(|| OperatorError::MissingField(format!("{} metadata.namespace", kind)))?;

        Ok(ObservedResource {
            reference: ChildResourceRef {
                kind,
                name,
                namespace,
                spec_hash: metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(annotations::SPEC_HASH))
                    .cloned(),
            },
            resource_version: metadata.resource_version.clone(),
            owned: is_owned(metadata),
        })
    }

    pub fn key(&self) -> ResourceKey {
        self.reference.key()
    }
}

/// Check if an object carries the operator ownership label
pub fn is_owned(metadata: &ObjectMeta) -> bool {
    metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(labels::MANAGED_BY))
        .is_some_and(|v| v == labels::MANAGED_BY_VALUE)
}

/// Hex SHA-256 of the canonical JSON encoding of `body`.
///
/// serde_json maps are ordered, so equal bodies always hash equally.
pub fn spec_hash(body: &Value) -> Result<String> {
    let bytes = serde_json::to_vec(body)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Label selector matching operator-owned resources
pub fn owned_selector() -> String {
    format!("{}={}", labels::MANAGED_BY, labels::MANAGED_BY_VALUE)
}
