// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Annotation-driven desired state.
//!
//! Each `namespace-operator.example.com/*` annotation on a namespace maps to
//! one child resource. Values that cannot be parsed make the whole namespace
//! fail with `InvalidPolicy`.

use super::DesiredStatePolicy;
use crate::constants::{annotations, children};
use crate::error::{OperatorError, Result};
use crate::types::{DesiredResource, DesiredState, NamespaceRecord, ResourceKind};
use k8s_openapi::api::core::v1::{
    ConfigMap, LimitRange, LimitRangeItem, LimitRangeSpec, ResourceQuota, ResourceQuotaSpec,
};
use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicySpec,
};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

/// Default container limits, as written in the limit-range annotation
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LimitRangeAnnotation {
    #[serde(default)]
    default: BTreeMap<String, String>,
    #[serde(default)]
    default_request: BTreeMap<String, String>,
    #[serde(default)]
    max: BTreeMap<String, String>,
    #[serde(default)]
    min: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationPolicy {
    /// Hard limits used when a namespace has no quota annotation
    pub default_resource_quota: Option<BTreeMap<String, String>>,
}

impl AnnotationPolicy {
    pub fn new(default_resource_quota: Option<BTreeMap<String, String>>) -> Self {
        Self {
            default_resource_quota,
        }
    }
}

impl DesiredStatePolicy for AnnotationPolicy {
    fn derive(&self, namespace: &NamespaceRecord) -> Result<DesiredState> {
        let ns = namespace.name.as_str();
        let mut desired = DesiredState::empty();

        let quota = match namespace.annotations.get(annotations::RESOURCE_QUOTA) {
            Some(raw) => Some(parse_json::<BTreeMap<String, String>>(
                ns,
                annotations::RESOURCE_QUOTA,
                raw,
            )?),
            None => self.default_resource_quota.clone(),
        };
        if let Some(hard) = quota.filter(|h| !h.is_empty()) {
            desired.push(resource_quota(ns, hard)?);
        }

        if let Some(raw) = namespace.annotations.get(annotations::LIMIT_RANGE) {
            let limits: LimitRangeAnnotation = parse_json(ns, annotations::LIMIT_RANGE, raw)?;
            desired.push(limit_range(ns, limits)?);
        }

        if let Some(raw) = namespace.annotations.get(annotations::BOOTSTRAP_CONFIG) {
            let data: BTreeMap<String, String> =
                parse_json(ns, annotations::BOOTSTRAP_CONFIG, raw)?;
            desired.push(bootstrap_config(ns, data)?);
        }

        if let Some(raw) = namespace.annotations.get(annotations::ADMIN_GROUPS) {
            let mut groups: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect();
            groups.sort();
            groups.dedup();
            if !groups.is_empty() {
                desired.push(admin_binding(ns, groups)?);
            }
        }

        if let Some(raw) = namespace.annotations.get(annotations::NETWORK_ISOLATION) {
            match raw.trim() {
                "true" => desired.push(isolation_policy(ns)?),
                "false" => {}
                other => {
                    return Err(invalid(
                        ns,
                        format!(
                            "{} must be \"true\" or \"false\", got {:?}",
                            annotations::NETWORK_ISOLATION,
                            other
                        ),
                    ))
                }
            }
        }

        debug!(namespace = %ns, resources = desired.len(), "Derived desired state");
        Ok(desired)
    }
}

fn invalid(namespace: &str, message: String) -> OperatorError {
    OperatorError::InvalidPolicy {
        namespace: namespace.to_string(),
        message,
    }
}

fn parse_json<T: DeserializeOwned>(namespace: &str, key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| invalid(namespace, format!("{}: {}", key, e)))
}

fn to_desired<T: Serialize>(
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    object: &T,
) -> Result<DesiredResource> {
    DesiredResource::new(kind, namespace, name, serde_json::to_value(object)?)
}

fn quantities(values: BTreeMap<String, String>) -> Option<BTreeMap<String, Quantity>> {
    if values.is_empty() {
        return None;
    }
    Some(values.into_iter().map(|(k, v)| (k, Quantity(v))).collect())
}

fn resource_quota(namespace: &str, hard: BTreeMap<String, String>) -> Result<DesiredResource> {
    let quota = ResourceQuota {
        spec: Some(ResourceQuotaSpec {
            hard: quantities(hard),
            ..Default::default()
        }),
        ..Default::default()
    };
    let name = format!("{}{}", children::RESOURCE_QUOTA_PREFIX, namespace);
    to_desired(ResourceKind::ResourceQuota, namespace, &name, &quota)
}

fn limit_range(namespace: &str, limits: LimitRangeAnnotation) -> Result<DesiredResource> {
    let range = LimitRange {
        spec: Some(LimitRangeSpec {
            limits: vec![LimitRangeItem {
                type_: "Container".to_string(),
                default: quantities(limits.default),
                default_request: quantities(limits.default_request),
                max: quantities(limits.max),
                min: quantities(limits.min),
                ..Default::default()
            }],
        }),
        ..Default::default()
    };
    to_desired(
        ResourceKind::LimitRange,
        namespace,
        children::LIMIT_RANGE,
        &range,
    )
}

fn bootstrap_config(namespace: &str, data: BTreeMap<String, String>) -> Result<DesiredResource> {
    let config_map = ConfigMap {
        data: Some(data),
        ..Default::default()
    };
    to_desired(
        ResourceKind::ConfigMap,
        namespace,
        children::BOOTSTRAP_CONFIG,
        &config_map,
    )
}

fn admin_binding(namespace: &str, groups: Vec<String>) -> Result<DesiredResource> {
    let binding = RoleBinding {
        role_ref: RoleRef {
            api_group: RBAC_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: children::ADMIN_CLUSTER_ROLE.to_string(),
        },
        subjects: Some(
            groups
                .into_iter()
                .map(|group| Subject {
                    api_group: Some(RBAC_GROUP.to_string()),
                    kind: "Group".to_string(),
                    name: group,
                    namespace: None,
                })
                .collect(),
        ),
        ..Default::default()
    };
    to_desired(
        ResourceKind::RoleBinding,
        namespace,
        children::ADMIN_BINDING,
        &binding,
    )
}

fn isolation_policy(namespace: &str) -> Result<DesiredResource> {
    let policy = NetworkPolicy {
        spec: Some(NetworkPolicySpec {
            ingress: Some(vec![NetworkPolicyIngressRule {
                from: Some(vec![NetworkPolicyPeer {
                    pod_selector: Some(LabelSelector::default()),
                    ..Default::default()
                }]),
                ports: None,
            }]),
            policy_types: Some(vec!["Ingress".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    };
    to_desired(
        ResourceKind::NetworkPolicy,
        namespace,
        children::ISOLATION_POLICY,
        &policy,
    )
}
