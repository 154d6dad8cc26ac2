// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cluster-scoped set of team namespaces, each named `<team>-<namespace>`
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "example.com", version = "v1", kind = "NamespaceSet")]
#[kube(status = "NamespaceSetStatus")]
#[kube(printcolumn = r#"{"name":"Managed","type":"integer","jsonPath":".status.managedNamespaces"}"#)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSetSpec {
    #[serde(default)]
    pub teams: Vec<TeamSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_quota: Option<ResourceQuotaTemplate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuotaTemplate {
    #[serde(default)]
    pub hard: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSetStatus {
    pub managed_namespaces: usize,
}

/// A namespace a NamespaceSet asks for
#[derive(Clone, Debug, PartialEq)]
pub struct ManagedNamespace {
    pub name: String,
    pub team: String,
    pub ns_type: String,
    pub resource_quota: Option<BTreeMap<String, String>>,
}

/// Namespace name for a team namespace
pub fn ns_name_for(team: &str, ns: &str) -> String {
    format!("{}-{}", team.to_lowercase(), ns.to_lowercase())
}

impl NamespaceSet {
    /// Namespaces this set asks for, keyed by namespace name.
    ///
    /// Teams without a name are skipped. An empty quota is treated as no quota.
    pub fn desired_namespaces(&self) -> BTreeMap<String, ManagedNamespace> {
        let mut desired = BTreeMap::new();

        for team in &self.spec.teams {
            let Some(team_name) = team.name.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            let quota = team
                .resource_quota
                .as_ref()
                .map(|rq| rq.hard.clone())
                .filter(|hard| !hard.is_empty());

            for ns in &team.namespaces {
                let name = ns_name_for(team_name, ns);
                desired.insert(
                    name.clone(),
                    ManagedNamespace {
                        name,
                        team: team_name.to_string(),
                        ns_type: ns.clone(),
                        resource_quota: quota.clone(),
                    },
                );
            }
        }

        desired
    }
}
